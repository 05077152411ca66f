//! GSF Record Decoder Library
//!
//! Reads sonar survey records from Generic Sensor Format (GSF) files through
//! the native GSF decoder, validates them against a typed record schema and
//! turns multi-beam pings into tabular rows.
//!
//! # Architecture
//!
//! - [`native`]: the native decoder seam (`libgsf` via FFI, or a replay of
//!   exported JSON lines)
//! - [`session`]: one open file on one backend, with version-specific
//!   payload decoding
//! - [`records`] / [`schema`]: the record model and the static ping field
//!   table
//! - [`flatten`]: per-ping and per-beam row construction
//! - [`sink`] / [`pipeline`]: consumers and the pull loop that feeds them
//!
//! The library does NOT parse binary GSF itself, talk to a message broker
//! or retry failed reads.
//!
//! # Example Usage
//!
//! ```no_run
//! use gsf_decoder::{
//!     CsvSink, FlattenOptions, FormatVersion, LibGsf, Pipeline, Session, SessionConfig,
//!     SinkShape,
//! };
//! use std::path::Path;
//!
//! let config = SessionConfig::new().with_version(FormatVersion::V3);
//! let mut session = Session::open(
//!     LibGsf::new("/opt/gsf/lib"),
//!     Path::new("survey.gsf"),
//!     config,
//! )?;
//!
//! let mut csv = CsvSink::create(Path::new("survey-flattened.csv"), SinkShape::Flattened)?;
//! let stats = Pipeline::new()
//!     .with_limit(Some(1000))
//!     .with_flatten_options(FlattenOptions::new().with_labels(true))
//!     .run(&mut session, &mut [&mut csv])?;
//!
//! println!("{} pings, {} rows", stats.pings, stats.rows_written);
//! # Ok::<(), gsf_decoder::DecoderError>(())
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod flatten;
pub mod lookup;
pub mod native;
pub mod pipeline;
pub mod records;
pub mod schema;
pub mod session;
pub mod sink;
pub mod types;

// Re-export main types for convenience
pub use codec::PayloadFormat;
pub use config::{FileMode, FlattenOptions, FormatVersion, OpenOptions, SessionConfig};
pub use flatten::{Column, ColumnLayout, Flattener, Row};
pub use lookup::{describe_error, label_record_type, label_sensor};
pub use native::{JsonLinesReplay, LibGsf, NativeDecoder};
pub use pipeline::{load_all, Pipeline, PipelineStats};
pub use records::{
    validate, Geo, QualityFlags, Record, RecordBody, RecordCollection, RecordType, SwathBathyPing,
};
pub use schema::{Cell, FieldClass, PingField, PING_FIELDS};
pub use session::{RawRecord, Session};
pub use sink::{CsvSink, JsonLinesSink, Publisher, PublisherSink, Sink, SinkShape};
pub use types::{DecoderError, ErrorKind, Result, SchemaError, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        assert!(!VERSION.is_empty());
        assert_eq!(PING_FIELDS.len(), 46);
        assert_eq!(RecordType::ALL.len(), 11);
    }
}
