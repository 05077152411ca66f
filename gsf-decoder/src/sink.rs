//! Record and row consumers
//!
//! A [`Sink`] declares which shape of output it wants. The pipeline sends it
//! rows of that shape for pings and hands every other record over as-is;
//! what a sink does with non-ping records is up to the sink.

use crate::flatten::Row;
use crate::records::Record;
use crate::types::{DecoderError, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// What a sink consumes for ping records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkShape {
    /// Whole records, including pings
    Records,
    /// One row per ping, arrays embedded
    Unflattened,
    /// One row per beam
    Flattened,
}

/// Downstream consumer of records and rows
pub trait Sink {
    fn shape(&self) -> SinkShape;

    /// Called once with the header before the first row
    fn begin(&mut self, _columns: &[&'static str]) -> Result<()> {
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<()>;

    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Flush buffered output
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A row as a JSON object keyed by column name
struct KeyedRow<'a> {
    columns: &'a [&'static str],
    row: &'a Row,
}

impl Serialize for KeyedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(&self.row.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

fn keyed_row(columns: &[&'static str], row: &Row) -> Result<String> {
    if columns.len() != row.len() {
        return Err(DecoderError::Sink(format!(
            "row has {} cells but the header has {} columns",
            row.len(),
            columns.len()
        )));
    }
    Ok(serde_json::to_string(&KeyedRow { columns, row })?)
}

/// Tabular output; non-ping records are skipped
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    shape: SinkShape,
    skipped: u64,
}

impl CsvSink<File> {
    pub fn create(path: &Path, shape: SinkShape) -> Result<Self> {
        log::info!("Writing {:?} CSV: {:?}", shape, path);
        Ok(Self::from_writer(File::create(path)?, shape))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W, shape: SinkShape) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            shape,
            skipped: 0,
        }
    }

    /// Non-ping records seen so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| DecoderError::Sink(e.to_string()))
    }
}

impl<W: Write> Sink for CsvSink<W> {
    fn shape(&self) -> SinkShape {
        self.shape
    }

    fn begin(&mut self, columns: &[&'static str]) -> Result<()> {
        self.writer.write_record(columns)?;
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<()> {
        self.writer
            .write_record(row.cells.iter().map(|cell| cell.to_string()))?;
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        log::trace!("CSV skips {} record {}", record.record_type, record.record_number);
        self.skipped += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One JSON value per line
///
/// A [`SinkShape::Records`] sink writes every record in the streaming line
/// format. Row-shaped sinks write rows as objects keyed by column name and
/// skip non-ping records, so each output line has the same shape.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    shape: SinkShape,
    columns: Vec<&'static str>,
    skipped: u64,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path, shape: SinkShape) -> Result<Self> {
        log::info!("Writing {:?} JSON lines: {:?}", shape, path);
        Ok(Self::from_writer(BufWriter::new(File::create(path)?), shape))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn from_writer(writer: W, shape: SinkShape) -> Self {
        Self {
            writer,
            shape,
            columns: Vec::new(),
            skipped: 0,
        }
    }

    /// Non-ping records left out of a row-shaped stream
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn shape(&self) -> SinkShape {
        self.shape
    }

    fn begin(&mut self, columns: &[&'static str]) -> Result<()> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<()> {
        let line = keyed_row(&self.columns, row)?;
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.shape != SinkShape::Records {
            log::trace!("JSON rows skip {} record {}", record.record_type, record.record_number);
            self.skipped += 1;
            return Ok(());
        }
        writeln!(self.writer, "{}", record.to_json_line()?)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Message-broker seam: one call per message
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()>;
}

impl<F> Publisher for F
where
    F: FnMut(&str, &[u8]) -> Result<()>,
{
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        self(topic, payload)
    }
}

/// Publishes one message per record or row, no batching
pub struct PublisherSink<P: Publisher> {
    publisher: P,
    topic: String,
    shape: SinkShape,
    columns: Vec<&'static str>,
    published: u64,
}

impl<P: Publisher> PublisherSink<P> {
    pub fn new(publisher: P, topic: impl Into<String>, shape: SinkShape) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            shape,
            columns: Vec::new(),
            published: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn into_inner(self) -> P {
        self.publisher
    }

    fn send(&mut self, payload: String) -> Result<()> {
        self.publisher.publish(&self.topic, payload.as_bytes())?;
        self.published += 1;
        Ok(())
    }
}

impl<P: Publisher> Sink for PublisherSink<P> {
    fn shape(&self) -> SinkShape {
        self.shape
    }

    fn begin(&mut self, columns: &[&'static str]) -> Result<()> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<()> {
        let payload = keyed_row(&self.columns, row)?;
        self.send(payload)
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        let payload = record.to_json_line()?;
        self.send(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Comment, RecordBody, RecordType};
    use crate::schema::Cell;
    use chrono::{TimeZone, Utc};

    fn comment() -> Record {
        Record {
            time: Utc.with_ymd_and_hms(2017, 3, 17, 21, 13, 24).unwrap(),
            source_file_name: "survey.gsf".to_string(),
            record_id: 6,
            record_number: 1,
            record_type: RecordType::Comment,
            version: "GSF-v03.10".to_string(),
            location: None,
            body: RecordBody::Comment(Comment {
                comment_length: 2,
                comment: "ok".to_string(),
            }),
        }
    }

    fn row() -> Row {
        Row {
            cells: vec![
                Cell::Time(Utc.with_ymd_and_hms(2017, 3, 17, 21, 13, 24).unwrap()),
                Cell::Null,
                Cell::List(vec![Cell::Float(1.0), Cell::Float(2.0)]),
            ],
        }
    }

    const COLUMNS: [&str; 3] = ["time", "latitude", "depth"];

    #[test]
    fn test_csv_rows_and_skipped_records() {
        let mut sink = CsvSink::from_writer(Vec::new(), SinkShape::Unflattened);
        sink.begin(&COLUMNS).unwrap();
        sink.write_row(&row()).unwrap();
        sink.write_record(&comment()).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.skipped(), 1);

        let output = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(
            output,
            "time,latitude,depth\n2017-03-17T21:13:24Z,,\"[1.0, 2.0]\"\n"
        );
    }

    #[test]
    fn test_json_lines_rows_are_keyed() {
        let mut sink = JsonLinesSink::from_writer(Vec::new(), SinkShape::Unflattened);
        sink.begin(&COLUMNS).unwrap();
        sink.write_row(&row()).unwrap();
        sink.write_record(&comment()).unwrap();
        assert_eq!(sink.skipped(), 1);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            output,
            "{\"time\":\"2017-03-17T21:13:24Z\",\"latitude\":null,\"depth\":[1.0,2.0]}\n"
        );
    }

    #[test]
    fn test_json_lines_records_keep_every_kind() {
        let mut sink = JsonLinesSink::from_writer(Vec::new(), SinkShape::Records);
        sink.write_record(&comment()).unwrap();
        sink.write_record(&comment()).unwrap();
        assert_eq!(sink.skipped(), 0);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(Record::from_json_line(lines[1]).unwrap(), comment());
    }

    #[test]
    fn test_row_without_header_is_a_sink_error() {
        let mut sink = JsonLinesSink::from_writer(Vec::new(), SinkShape::Flattened);
        let err = sink.write_row(&row()).unwrap_err();
        assert_eq!(err.kind(), crate::types::ErrorKind::Sink);
    }

    #[test]
    fn test_publisher_sends_streaming_lines() {
        let mut messages: Vec<(String, Vec<u8>)> = Vec::new();
        {
            let publisher = |topic: &str, payload: &[u8]| -> Result<()> {
                messages.push((topic.to_string(), payload.to_vec()));
                Ok(())
            };
            let mut sink = PublisherSink::new(publisher, "gsf.records", SinkShape::Records);
            sink.write_record(&comment()).unwrap();
            assert_eq!(sink.published(), 1);
        }

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "gsf.records");
        assert_eq!(messages[0].1, comment().to_json_line().unwrap().into_bytes());
    }

    #[test]
    fn test_publisher_failure_propagates() {
        let failing = |_: &str, _: &[u8]| -> Result<()> {
            Err(DecoderError::Sink("broker unavailable".to_string()))
        };
        let mut sink = PublisherSink::new(failing, "gsf.records", SinkShape::Records);
        assert!(sink.write_record(&comment()).is_err());
        assert_eq!(sink.published(), 0);
    }
}
