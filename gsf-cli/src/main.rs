//! GSF Reader CLI Application
//!
//! Command-line front end for the gsf-decoder library:
//! - `json`: export records as JSON lines (or flattened rows, or one document)
//! - `csv`: write unflattened and flattened ping tables
//! - `count`: per-type record counts from an indexed session

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gsf_decoder::{
    load_all, CsvSink, FileMode, FlattenOptions, FormatVersion, JsonLinesReplay, JsonLinesSink,
    LibGsf, NativeDecoder, OpenOptions, Pipeline, PipelineStats, RecordType, Session,
    SessionConfig, Sink, SinkShape,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

mod config;

use config::AppConfig;

/// GSF Reader - Decode GSF sonar files
#[derive(Parser, Debug)]
#[command(name = "gsf-cli")]
#[command(about = "Decode GSF sonar files to JSON lines or CSV", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(clap::Args, Debug)]
struct InputArgs {
    /// GSF file, read through the native library
    #[arg(long, value_name = "FILE", required_unless_present = "json_file")]
    gsf_file: Option<PathBuf>,

    /// Previously exported JSON-lines file to replay
    #[arg(long, value_name = "FILE", conflicts_with = "gsf_file")]
    json_file: Option<PathBuf>,

    /// GSF format version: 03.08, 03.09 or 03.10
    #[arg(long, value_name = "VERSION")]
    gsf_version: Option<FormatVersion>,

    /// Directory holding the versioned libgsf shared libraries
    #[arg(long, value_name = "DIR")]
    library_dir: Option<PathBuf>,

    /// Stop after this many records
    #[arg(long, value_name = "COUNT")]
    num_records: Option<usize>,

    /// Only read records of this type code (0 = all)
    #[arg(long, value_name = "CODE", default_value_t = 0)]
    desired_record: i32,

    /// Ask the decoder for sensor-specific fields
    #[arg(long)]
    include_extra_fields: bool,
}

impl InputArgs {
    fn filter(&self) -> Result<Option<RecordType>> {
        if self.desired_record == 0 {
            return Ok(None);
        }
        let record_type = RecordType::try_from(self.desired_record)
            .with_context(|| format!("Invalid --desired-record {}", self.desired_record))?;
        Ok(Some(record_type))
    }

    fn source(&self) -> Result<&Path> {
        match (&self.gsf_file, &self.json_file) {
            (Some(path), _) | (None, Some(path)) => Ok(path.as_path()),
            (None, None) => bail!("either --gsf-file or --json-file is required"),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export records as JSON lines
    Json {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write one object per beam instead of whole records; records
        /// other than pings are left out
        #[arg(long)]
        flatten: bool,

        /// Write a single pretty-printed collection document
        #[arg(long, conflicts_with = "flatten", requires = "output")]
        document: bool,
    },

    /// Write ping tables as CSV
    Csv {
        #[command(flatten)]
        input: InputArgs,

        /// Output prefix; writes <PREFIX>.csv and <PREFIX>-flattened.csv
        #[arg(short, long, value_name = "PREFIX")]
        output: Option<PathBuf>,

        /// Also write the per-beam table
        #[arg(long)]
        flatten: bool,

        /// Load the whole file into memory before writing
        #[arg(long)]
        in_memory: bool,
    },

    /// Count records per type (indexed read)
    Count {
        #[command(flatten)]
        input: InputArgs,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("GSF Reader CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", gsf_decoder::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    match &args.command {
        Command::Json {
            input,
            output,
            flatten,
            document,
        } => json_mode(input, &config, output.as_deref(), *flatten, *document),
        Command::Csv {
            input,
            output,
            flatten,
            in_memory,
        } => csv_mode(input, &config, output.as_deref(), *flatten, *in_memory),
        Command::Count { input } => count_mode(input, &config),
    }
}

/// Open a session on the backend the input flags select
fn open_session(
    input: &InputArgs,
    config: &AppConfig,
    mode: FileMode,
) -> Result<Session<Box<dyn NativeDecoder>>> {
    let path = input.source()?;
    let version = input
        .gsf_version
        .or(config.decoder.version)
        .unwrap_or_default();

    let mut options = OpenOptions::new()
        .with_denormalized_fields(input.include_extra_fields || config.decoder.include_denormalized_fields);
    if let Some(size) = config.decoder.buffer_size {
        options = options.with_buffer_size(size);
    }

    let session_config = SessionConfig::new()
        .with_mode(mode)
        .with_version(version)
        .with_options(options);

    let backend: Box<dyn NativeDecoder> = if input.gsf_file.is_some() {
        match (&input.library_dir, &config.decoder.library_file, &config.decoder.library_dir) {
            (Some(dir), _, _) => Box::new(LibGsf::new(dir)),
            (None, Some(file), _) => Box::new(LibGsf::with_library_file(file)),
            (None, None, Some(dir)) => Box::new(LibGsf::new(dir)),
            (None, None, None) => Box::new(LibGsf::new("lib")),
        }
    } else {
        Box::new(JsonLinesReplay::new())
    };

    Session::open(backend, path, session_config).with_context(|| format!("Failed to open {:?}", path))
}

fn flatten_options(config: &AppConfig) -> FlattenOptions {
    FlattenOptions::new().with_labels(config.output.include_labels)
}

fn json_mode(
    input: &InputArgs,
    config: &AppConfig,
    output: Option<&Path>,
    flatten: bool,
    document: bool,
) -> Result<()> {
    let mut session = open_session(input, config, FileMode::Sequential)?;
    let filter = input.filter()?;

    if document {
        let path = output.context("--document requires --output")?;
        let collection = load_all(&mut session, filter, input.num_records)?;
        collection.write_json(path, true)?;
        log::info!("Wrote {} records to {:?}", collection.len(), path);
        return Ok(());
    }

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let shape = if flatten {
        SinkShape::Flattened
    } else {
        SinkShape::Records
    };
    let mut sink = JsonLinesSink::from_writer(writer, shape);

    let stats = Pipeline::new()
        .with_limit(input.num_records)
        .with_filter(filter)
        .with_flatten_options(flatten_options(config))
        .run(&mut session, &mut [&mut sink])?;

    log_stats(&stats);
    Ok(())
}

/// `<dir>/<file stem>` of the input, unless a prefix was given
fn csv_prefix(input: &Path, output: Option<&Path>, config: &AppConfig) -> PathBuf {
    if let Some(prefix) = output {
        return prefix.to_path_buf();
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gsf".to_string());
    match &config.output.directory {
        Some(dir) => dir.join(stem),
        None => PathBuf::from(stem),
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn csv_mode(
    input: &InputArgs,
    config: &AppConfig,
    output: Option<&Path>,
    flatten: bool,
    in_memory: bool,
) -> Result<()> {
    let prefix = csv_prefix(input.source()?, output, config);
    if let Some(dir) = prefix.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }

    let mut session = open_session(input, config, FileMode::Sequential)?;
    let pipeline = Pipeline::new()
        .with_limit(input.num_records)
        .with_filter(input.filter()?)
        .with_flatten_options(flatten_options(config));

    let unflattened_path = with_suffix(&prefix, ".csv");
    let mut unflattened = CsvSink::create(&unflattened_path, SinkShape::Unflattened)?;
    let mut flattened = if flatten {
        Some(CsvSink::create(&with_suffix(&prefix, "-flattened.csv"), SinkShape::Flattened)?)
    } else {
        None
    };

    let mut sinks: Vec<&mut dyn Sink> = Vec::with_capacity(2);
    sinks.push(&mut unflattened);
    if let Some(sink) = flattened.as_mut() {
        sinks.push(sink);
    }

    let stats = if in_memory {
        let collection = load_all(&mut session, input.filter()?, input.num_records)?;
        session.close()?;
        pipeline.run_collection(&collection, &mut sinks)?
    } else {
        pipeline.run(&mut session, &mut sinks)?
    };

    log_stats(&stats);
    println!("Wrote {} pings to {:?}", stats.pings, unflattened_path);
    if flatten {
        println!("Wrote {} beam rows", stats.rows_written - stats.pings);
    }
    Ok(())
}

fn count_mode(input: &InputArgs, config: &AppConfig) -> Result<()> {
    let mut session = open_session(input, config, FileMode::Indexed)?;

    println!("Record counts for {:?}:", session.path());
    let mut total = 0;
    for record_type in RecordType::ALL {
        let count = session.count(record_type)?;
        total += count;
        if count > 0 {
            println!("  {:<40} {:>8}", record_type.label(), count);
        }
    }
    println!("  {:<40} {:>8}", "Total", total);

    session.close()?;
    Ok(())
}

fn log_stats(stats: &PipelineStats) {
    log::info!(
        "Read {} records: {} pings, {} rows written",
        stats.records_read,
        stats.pings,
        stats.rows_written
    );
    for (record_type, count) in &stats.by_type {
        log::debug!("  {}: {}", record_type, count);
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
