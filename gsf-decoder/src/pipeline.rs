//! Orchestration loop
//!
//! Pulls records one at a time, routes pings through the flattener and
//! forwards everything to the sinks. Only the current record is alive at
//! any point; [`load_all`] is the separate batch path that holds a whole
//! file in memory.

use crate::config::FlattenOptions;
use crate::flatten::{Flattener, Row};
use crate::native::NativeDecoder;
use crate::records::{Record, RecordCollection, RecordType};
use crate::session::Session;
use crate::sink::{Sink, SinkShape};
use crate::types::Result;
use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Counters for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub records_read: usize,
    pub pings: usize,
    /// Rows delivered, summed over all row-shaped sinks
    pub rows_written: usize,
    pub by_type: BTreeMap<RecordType, usize>,
}

/// Pull-based record pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    limit: Option<usize>,
    filter: Option<RecordType>,
    flatten: FlattenOptions,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: stop after `limit` records
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Builder method: only pull one record type from the decoder
    pub fn with_filter(mut self, filter: Option<RecordType>) -> Self {
        self.filter = filter;
        self
    }

    /// Builder method: set flattening options
    pub fn with_flatten_options(mut self, options: FlattenOptions) -> Self {
        self.flatten = options;
        self
    }

    /// Drain `session` into `sinks`
    pub fn run<B: NativeDecoder>(
        &self,
        session: &mut Session<B>,
        sinks: &mut [&mut dyn Sink],
    ) -> Result<PipelineStats> {
        self.run_until(session, sinks, |_| false)
    }

    /// Like [`Pipeline::run`], but `stop` can end the run after any record
    pub fn run_until<B, F>(
        &self,
        session: &mut Session<B>,
        sinks: &mut [&mut dyn Sink],
        stop: F,
    ) -> Result<PipelineStats>
    where
        B: NativeDecoder,
        F: FnMut(&Record) -> bool,
    {
        log::info!(
            "Processing {:?} (filter: {:?}, limit: {:?})",
            session.path(),
            self.filter,
            self.limit
        );
        self.drive(session.records(self.filter), sinks, stop)
    }

    /// Drive sinks from an in-memory collection
    pub fn run_collection(
        &self,
        collection: &RecordCollection,
        sinks: &mut [&mut dyn Sink],
    ) -> Result<PipelineStats> {
        let filter = self.filter;
        let records = collection
            .iter()
            .filter(move |r| filter.map_or(true, |f| r.record_type == f))
            .map(Ok);
        self.drive(records, sinks, |_| false)
    }

    fn drive<I, R, F>(&self, records: I, sinks: &mut [&mut dyn Sink], stop: F) -> Result<PipelineStats>
    where
        I: Iterator<Item = Result<R>>,
        R: Borrow<Record>,
        F: FnMut(&Record) -> bool,
    {
        let mut stats = PipelineStats::default();
        let pumped = self.pump(records, sinks, stop, &mut stats);

        // Sinks are flushed on every exit path; the first error wins
        let mut finished = Ok(());
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.finish() {
                log::warn!("Sink failed to finish: {}", e);
                if finished.is_ok() {
                    finished = Err(e);
                }
            }
        }

        pumped?;
        finished?;

        log::info!(
            "Processed {} records ({} pings, {} rows written)",
            stats.records_read,
            stats.pings,
            stats.rows_written
        );
        Ok(stats)
    }

    fn pump<I, R, F>(
        &self,
        mut records: I,
        sinks: &mut [&mut dyn Sink],
        mut stop: F,
        stats: &mut PipelineStats,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<R>>,
        R: Borrow<Record>,
        F: FnMut(&Record) -> bool,
    {
        let wants = |shape: SinkShape| sinks.iter().any(|s| s.shape() == shape);
        let wants_unflattened = wants(SinkShape::Unflattened);
        let wants_flattened = wants(SinkShape::Flattened);

        let mut flattener = Flattener::new(self.flatten.clone());
        let mut begun = false;

        loop {
            if self.limit.is_some_and(|limit| stats.records_read >= limit) {
                log::debug!("Record limit reached");
                break;
            }

            let Some(item) = records.next() else {
                break;
            };
            let owned = item?;
            let record: &Record = owned.borrow();

            stats.records_read += 1;
            *stats.by_type.entry(record.record_type).or_insert(0) += 1;

            if record.ping().is_some() {
                stats.pings += 1;

                let unflattened: Option<Row> = if wants_unflattened {
                    Some(flattener.unflattened(record)?)
                } else {
                    None
                };
                let flattened: Vec<Row> = if wants_flattened {
                    flattener.flattened(record)?
                } else {
                    Vec::new()
                };

                if !begun {
                    if let Some(layout) = flattener.layout() {
                        let header = layout.header();
                        for sink in sinks.iter_mut() {
                            if sink.shape() != SinkShape::Records {
                                sink.begin(&header)?;
                            }
                        }
                        begun = true;
                    }
                }

                for sink in sinks.iter_mut() {
                    match sink.shape() {
                        SinkShape::Records => sink.write_record(record)?,
                        SinkShape::Unflattened => {
                            if let Some(row) = &unflattened {
                                sink.write_row(row)?;
                                stats.rows_written += 1;
                            }
                        }
                        SinkShape::Flattened => {
                            for row in &flattened {
                                sink.write_row(row)?;
                            }
                            stats.rows_written += flattened.len();
                        }
                    }
                }
            } else {
                for sink in sinks.iter_mut() {
                    sink.write_record(record)?;
                }
            }

            if stop(record) {
                log::debug!("Stopped early after record {}", record.record_number);
                break;
            }
        }

        Ok(())
    }
}

/// Read a whole session into memory
///
/// This is the higher-memory batch path: every record is held until the
/// collection is dropped. Prefer [`Pipeline::run`] for streaming.
pub fn load_all<B: NativeDecoder>(
    session: &mut Session<B>,
    filter: Option<RecordType>,
    limit: Option<usize>,
) -> Result<RecordCollection> {
    log::info!("Loading {:?} into memory", session.path());

    let records = session
        .records(filter)
        .take(limit.unwrap_or(usize::MAX))
        .collect::<Result<Vec<_>>>()?;

    log::debug!("Loaded {} records", records.len());
    Ok(RecordCollection::new(records))
}
