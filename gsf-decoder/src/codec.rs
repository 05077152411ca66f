//! Record payload codec
//!
//! The native decoder hands back one self-describing JSON payload per
//! record. Two payload layouts exist across format versions:
//!
//! - **Enveloped**: envelope metadata plus a single `body` object whose
//!   shape is selected by `record_type`. This is also the streaming line
//!   format written by the JSON-lines sink.
//! - **Slotted**: envelope metadata plus one optional slot per record kind
//!   (`header`, `mb_ping`, `summary`, ...), exactly one of which is set.

use crate::records::{Geo, Record, RecordBody, RecordType};
use crate::types::{MultipleVariants, Result, SchemaError, Timestamp};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Payload layout produced by a decoder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Enveloped,
    Slotted,
}

/// Metadata common to both layouts
#[derive(Deserialize)]
struct Meta {
    time: Timestamp,
    source_file_name: String,
    record_id: u32,
    record_number: u64,
    record_type: i32,
    version: String,
    #[serde(default)]
    location: Option<Geo>,
}

impl Meta {
    fn into_record(self, body: RecordBody) -> std::result::Result<Record, SchemaError> {
        let record_type = RecordType::try_from(self.record_type)?;
        Ok(Record {
            time: self.time,
            source_file_name: self.source_file_name,
            record_id: self.record_id,
            record_number: self.record_number,
            record_type,
            version: self.version,
            location: self.location,
            body,
        })
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(flatten)]
    meta: Meta,
    #[serde(default)]
    body: Option<Value>,
}

impl Envelope {
    fn into_record(self) -> Result<Record> {
        let record_type = RecordType::try_from(self.meta.record_type)?;
        let body = match self.body {
            Some(value) if !value.is_null() => RecordBody::from_value(record_type, value)?,
            _ => return Err(SchemaError::MissingBody(record_type).into()),
        };
        Ok(self.meta.into_record(body)?)
    }
}

#[derive(Deserialize)]
struct Slotted {
    #[serde(flatten)]
    meta: Meta,
    header: Option<Value>,
    mb_ping: Option<Value>,
    svp: Option<Value>,
    process_parameters: Option<Value>,
    sensor_parameters: Option<Value>,
    comment: Option<Value>,
    history: Option<Value>,
    summary: Option<Value>,
    sb_ping: Option<Value>,
    hv_nav_error: Option<Value>,
    attitude: Option<Value>,
}

impl Slotted {
    fn into_record(self) -> Result<Record> {
        let declared = RecordType::try_from(self.meta.record_type)?;
        let slots = [
            ("header", RecordType::Header, self.header),
            ("mb_ping", RecordType::SwathBathyPing, self.mb_ping),
            ("svp", RecordType::SoundVelocityProfile, self.svp),
            ("process_parameters", RecordType::ProcessingParameters, self.process_parameters),
            ("sensor_parameters", RecordType::SensorParameters, self.sensor_parameters),
            ("comment", RecordType::Comment, self.comment),
            ("history", RecordType::History, self.history),
            ("summary", RecordType::SwathBathySummary, self.summary),
            ("sb_ping", RecordType::SingleBeamPing, self.sb_ping),
            ("hv_nav_error", RecordType::HvNavigationError, self.hv_nav_error),
            ("attitude", RecordType::Attitude, self.attitude),
        ];

        let mut populated: Vec<(&'static str, RecordType, Value)> = slots
            .into_iter()
            .filter_map(|(name, rt, value)| value.filter(|v| !v.is_null()).map(|v| (name, rt, v)))
            .collect();

        if populated.len() > 1 {
            let names = populated.iter().map(|(name, _, _)| *name).collect();
            return Err(SchemaError::MultipleVariants(MultipleVariants(names)).into());
        }

        let (_, found, value) = populated
            .pop()
            .ok_or(SchemaError::MissingBody(declared))?;
        if found != declared {
            return Err(SchemaError::VariantMismatch { declared, found }.into());
        }

        let body = RecordBody::from_value(found, value)?;
        Ok(self.meta.into_record(body)?)
    }
}

/// Decode one payload into a record (not yet validated)
pub fn decode(payload: &[u8], format: PayloadFormat) -> Result<Record> {
    match format {
        PayloadFormat::Enveloped => serde_json::from_slice::<Envelope>(payload)?.into_record(),
        PayloadFormat::Slotted => serde_json::from_slice::<Slotted>(payload)?.into_record(),
    }
}

/// Encode a record as one streaming line (enveloped layout, no newline)
pub fn encode_line(record: &Record) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Envelope::deserialize(deserializer)?
            .into_record()
            .map_err(serde::de::Error::custom)
    }
}
