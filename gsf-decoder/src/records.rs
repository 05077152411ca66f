//! GSF record model
//!
//! One [`Record`] is produced per decode call. It carries the envelope
//! metadata shared by every record kind plus exactly one variant body.
//! Records are immutable once validated and are consumed by a single
//! downstream transform.

use crate::types::{DecoderError, Result, SchemaError, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Native record type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum RecordType {
    Header = 1,
    SwathBathyPing = 2,
    SoundVelocityProfile = 3,
    ProcessingParameters = 4,
    SensorParameters = 5,
    Comment = 6,
    History = 7,
    SwathBathySummary = 9,
    SingleBeamPing = 10,
    HvNavigationError = 11,
    Attitude = 12,
}

impl RecordType {
    /// Every record type, in native code order
    pub const ALL: [RecordType; 11] = [
        RecordType::Header,
        RecordType::SwathBathyPing,
        RecordType::SoundVelocityProfile,
        RecordType::ProcessingParameters,
        RecordType::SensorParameters,
        RecordType::Comment,
        RecordType::History,
        RecordType::SwathBathySummary,
        RecordType::SingleBeamPing,
        RecordType::HvNavigationError,
        RecordType::Attitude,
    ];

    /// Native integer code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up a record type by native code
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|rt| rt.code() == code)
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        crate::lookup::record_type_name(self.code()).unwrap_or("Unknown record type")
    }

    /// Filter code for a native read: 0 means "next record of any type"
    pub fn filter_code(filter: Option<RecordType>) -> i32 {
        filter.map(RecordType::code).unwrap_or(0)
    }
}

impl TryFrom<i32> for RecordType {
    type Error = SchemaError;

    fn try_from(code: i32) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or(SchemaError::UnknownRecordType(code))
    }
}

impl From<RecordType> for i32 {
    fn from(rt: RecordType) -> Self {
        rt.code()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geo {
    pub latitude: f64,
    pub longitude: f64,
}

impl Geo {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// File header record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Format version string written by the producer, e.g. "GSF-v03.10"
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_length: u32,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub host_name: String,
    pub operator_name: String,
    pub command_line: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub num_measurements: u32,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub heave: Option<f64>,
    pub heading: Option<f64>,
}

/// Bounding box and depth range of the whole survey file
///
/// Accepts both the nested and the flat wire shape; always serializes nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SummaryWire")]
pub struct SwathBathySummary {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub min_location: Geo,
    pub max_location: Geo,
    pub min_depth: f64,
    pub max_depth: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SummaryWire {
    Nested {
        start_time: Timestamp,
        end_time: Timestamp,
        min_location: Geo,
        max_location: Geo,
        min_depth: f64,
        max_depth: f64,
    },
    Flat {
        start_time: Timestamp,
        end_time: Timestamp,
        min_latitude: f64,
        min_longitude: f64,
        max_latitude: f64,
        max_longitude: f64,
        min_depth: f64,
        max_depth: f64,
    },
}

impl From<SummaryWire> for SwathBathySummary {
    fn from(wire: SummaryWire) -> Self {
        match wire {
            SummaryWire::Nested {
                start_time,
                end_time,
                min_location,
                max_location,
                min_depth,
                max_depth,
            } => Self {
                start_time,
                end_time,
                min_location,
                max_location,
                min_depth,
                max_depth,
            },
            SummaryWire::Flat {
                start_time,
                end_time,
                min_latitude,
                min_longitude,
                max_latitude,
                max_longitude,
                min_depth,
                max_depth,
            } => Self {
                start_time,
                end_time,
                min_location: Geo::new(min_latitude, min_longitude),
                max_location: Geo::new(max_latitude, max_longitude),
                min_depth,
                max_depth,
            },
        }
    }
}

/// Per-beam quality flags
///
/// The decoder emits one flag character per beam; older exports carry a
/// list of integer codes instead. Either form is kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualityFlags {
    Text(String),
    Codes(Vec<i64>),
}

impl QualityFlags {
    /// Number of beams covered
    pub fn len(&self) -> usize {
        match self {
            QualityFlags::Text(flags) => flags.chars().count(),
            QualityFlags::Codes(codes) => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cross-model sensor fields exposed by every sonar model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    pub ping_counter: Option<i64>,
    pub model_number: Option<i64>,
}

/// One multi-beam sounding
///
/// Field order is significant: it is the declaration order used for
/// tabular column layout (see [`crate::schema::PING_FIELDS`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwathBathyPing {
    pub height: f64,
    pub sep: f64,
    pub number_beams: u32,
    pub center_beam: u32,
    pub ping_flags: Option<i64>,
    pub reserved: i64,
    pub tide_corrector: f64,
    pub gps_tide_corrector: f64,
    pub depth_corrector: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub heave: f64,
    pub course: f64,
    pub speed: f64,
    pub depth: Option<Vec<f64>>,
    pub nominal_depth: Option<Vec<f64>>,
    pub across_track: Option<Vec<f64>>,
    pub along_track: Option<Vec<f64>>,
    pub travel_time: Option<Vec<f64>>,
    pub beam_angle: Option<Vec<f64>>,
    pub mc_amplitude: Option<Vec<f64>>,
    pub mr_amplitude: Option<Vec<f64>>,
    pub echo_width: Option<Vec<f64>>,
    pub quality_factor: Option<Vec<f64>>,
    pub receive_heave: Option<Vec<f64>>,
    pub depth_error: Option<Vec<f64>>,
    pub across_track_error: Option<Vec<f64>>,
    pub along_track_error: Option<Vec<f64>>,
    pub quality_flags: Option<QualityFlags>,
    pub beam_flags: Option<Vec<i64>>,
    pub signal_to_noise: Option<f64>,
    pub beam_angle_forward: Option<Vec<f64>>,
    pub vertical_error: Option<Vec<f64>>,
    pub horizontal_error: Option<Vec<f64>>,
    pub sector_number: Option<Vec<i64>>,
    pub detection_info: Option<Vec<i64>>,
    pub incident_beam_adj: Option<Vec<f64>>,
    pub system_cleaning: Option<Vec<i64>>,
    pub doppler_corr: Option<Vec<f64>>,
    pub sonar_vert_uncert: Option<Vec<f64>>,
    pub sonar_horiz_uncert: Option<Vec<f64>>,
    pub detection_window: Option<Vec<f64>>,
    pub mean_abs_coeff: Option<Vec<f64>>,
    pub sensor_id: i32,
    pub sensor_data: Option<SensorData>,
}

/// Sound speed as a function of depth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundVelocityProfile {
    pub observation_time: Timestamp,
    pub application_time: Timestamp,
    pub number_points: u32,
    pub depth: Vec<f64>,
    pub sound_speed: Vec<f64>,
}

/// Processing or sensor parameters as `KEY=VALUE` strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub param_time: Timestamp,
    pub number_parameters: u32,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleBeamPing {
    pub tide_corrector: f64,
    pub depth_corrector: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub heave: f64,
    pub depth: f64,
    pub sound_speed_correction: f64,
    pub positioning_system_type: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HvNavigationError {
    pub horizontal_error: f64,
    pub vertical_error: f64,
    pub sep_uncertainty: Option<f64>,
    pub position_type: String,
}

/// The variant-specific part of a record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordBody {
    Header(Header),
    SwathBathyPing(Box<SwathBathyPing>),
    SoundVelocityProfile(SoundVelocityProfile),
    ProcessingParameters(Parameters),
    SensorParameters(Parameters),
    Comment(Comment),
    History(History),
    SwathBathySummary(SwathBathySummary),
    SingleBeamPing(SingleBeamPing),
    HvNavigationError(HvNavigationError),
    Attitude(Attitude),
}

impl RecordBody {
    /// The record type this body belongs to
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordBody::Header(_) => RecordType::Header,
            RecordBody::SwathBathyPing(_) => RecordType::SwathBathyPing,
            RecordBody::SoundVelocityProfile(_) => RecordType::SoundVelocityProfile,
            RecordBody::ProcessingParameters(_) => RecordType::ProcessingParameters,
            RecordBody::SensorParameters(_) => RecordType::SensorParameters,
            RecordBody::Comment(_) => RecordType::Comment,
            RecordBody::History(_) => RecordType::History,
            RecordBody::SwathBathySummary(_) => RecordType::SwathBathySummary,
            RecordBody::SingleBeamPing(_) => RecordType::SingleBeamPing,
            RecordBody::HvNavigationError(_) => RecordType::HvNavigationError,
            RecordBody::Attitude(_) => RecordType::Attitude,
        }
    }

    /// Decode a body whose shape is selected by `record_type`
    pub(crate) fn from_value(
        record_type: RecordType,
        value: serde_json::Value,
    ) -> serde_json::Result<Self> {
        use serde_json::from_value;

        Ok(match record_type {
            RecordType::Header => RecordBody::Header(from_value(value)?),
            RecordType::SwathBathyPing => RecordBody::SwathBathyPing(Box::new(from_value(value)?)),
            RecordType::SoundVelocityProfile => RecordBody::SoundVelocityProfile(from_value(value)?),
            RecordType::ProcessingParameters => RecordBody::ProcessingParameters(from_value(value)?),
            RecordType::SensorParameters => RecordBody::SensorParameters(from_value(value)?),
            RecordType::Comment => RecordBody::Comment(from_value(value)?),
            RecordType::History => RecordBody::History(from_value(value)?),
            RecordType::SwathBathySummary => RecordBody::SwathBathySummary(from_value(value)?),
            RecordType::SingleBeamPing => RecordBody::SingleBeamPing(from_value(value)?),
            RecordType::HvNavigationError => RecordBody::HvNavigationError(from_value(value)?),
            RecordType::Attitude => RecordBody::Attitude(from_value(value)?),
        })
    }
}

/// A single decoded GSF record
///
/// Deserialization goes through the enveloped wire layout, see [`crate::codec`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub time: Timestamp,
    pub source_file_name: String,
    pub record_id: u32,
    pub record_number: u64,
    pub record_type: RecordType,
    pub version: String,
    pub location: Option<Geo>,
    pub body: RecordBody,
}

impl Record {
    /// The ping body, if this is a swath bathymetry ping
    pub fn ping(&self) -> Option<&SwathBathyPing> {
        match &self.body {
            RecordBody::SwathBathyPing(ping) => Some(ping),
            _ => None,
        }
    }

    /// Check every record invariant without consuming the record
    pub fn check(&self) -> std::result::Result<(), SchemaError> {
        let found = self.body.record_type();
        if found != self.record_type {
            return Err(SchemaError::VariantMismatch {
                declared: self.record_type,
                found,
            });
        }

        match &self.body {
            RecordBody::SwathBathyPing(ping) => ping.check_beam_lengths(),
            RecordBody::SoundVelocityProfile(svp) => svp.check_point_counts(),
            _ => Ok(()),
        }
    }

    /// Validate and hand the record back
    pub fn validate(self) -> std::result::Result<Self, SchemaError> {
        self.check()?;
        Ok(self)
    }

    /// Encode as one streaming line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String> {
        crate::codec::encode_line(self)
    }

    /// Decode and validate one streaming line
    pub fn from_json_line(line: &str) -> Result<Self> {
        let record = crate::codec::decode(line.as_bytes(), crate::codec::PayloadFormat::Enveloped)?;
        Ok(record.validate()?)
    }
}

/// Validate a record's schema invariants
pub fn validate(record: Record) -> std::result::Result<Record, SchemaError> {
    record.validate()
}

impl SoundVelocityProfile {
    fn check_point_counts(&self) -> std::result::Result<(), SchemaError> {
        let expected = self.number_points as usize;
        for (field, values) in [("depth", &self.depth), ("sound_speed", &self.sound_speed)] {
            if values.len() != expected {
                return Err(SchemaError::PointCountMismatch {
                    field,
                    expected,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }
}

/// A whole file held in memory
///
/// This is the higher-memory batch form; streaming consumers should pull
/// records one at a time from a session instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordCollection {
    #[serde(default)]
    pub records: Vec<Record>,
}

impl RecordCollection {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Number of records of one type
    pub fn count_of(&self, record_type: RecordType) -> usize {
        self.records
            .iter()
            .filter(|r| r.record_type == record_type)
            .count()
    }

    /// Parse a `{"records": [...]}` document and validate every record
    pub fn from_json_str(json: &str) -> Result<Self> {
        let collection: RecordCollection = serde_json::from_str(json)?;
        for record in &collection.records {
            record.check()?;
        }
        Ok(collection)
    }

    /// Read a collection document from disk
    pub fn read_json(path: &Path) -> Result<Self> {
        log::info!("Loading record collection: {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Write the collection as a single JSON document
    pub fn write_json(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
        .map_err(DecoderError::from)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a RecordCollection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn header_record() -> Record {
        Record {
            time: chrono::Utc.with_ymd_and_hms(2017, 3, 17, 21, 13, 24).unwrap(),
            source_file_name: "survey.gsf".to_string(),
            record_id: 1,
            record_number: 1,
            record_type: RecordType::Header,
            version: "GSF-v03.10".to_string(),
            location: None,
            body: RecordBody::Header(Header {
                version: "GSF-v03.10".to_string(),
            }),
        }
    }

    #[test]
    fn test_record_type_codes() {
        assert_eq!(RecordType::SwathBathyPing.code(), 2);
        assert_eq!(RecordType::from_code(9), Some(RecordType::SwathBathySummary));
        assert_eq!(RecordType::from_code(8), None);
        assert_eq!(RecordType::from_code(0), None);
        assert_eq!(RecordType::filter_code(None), 0);
        assert_eq!(RecordType::filter_code(Some(RecordType::Attitude)), 12);
        assert!(matches!(
            RecordType::try_from(42),
            Err(SchemaError::UnknownRecordType(42))
        ));
    }

    #[test]
    fn test_record_type_serializes_as_code() {
        let json = serde_json::to_string(&RecordType::SwathBathyPing).unwrap();
        assert_eq!(json, "2");
        let back: RecordType = serde_json::from_str("12").unwrap();
        assert_eq!(back, RecordType::Attitude);
        assert!(serde_json::from_str::<RecordType>("8").is_err());
    }

    #[test]
    fn test_variant_mismatch_is_rejected() {
        let mut record = header_record();
        record.record_type = RecordType::Comment;
        assert_eq!(
            record.validate(),
            Err(SchemaError::VariantMismatch {
                declared: RecordType::Comment,
                found: RecordType::Header,
            })
        );
    }

    #[test]
    fn test_summary_accepts_flat_shape() {
        let json = r#"{
            "start_time": "2017-03-17T21:13:24Z",
            "end_time": "2017-03-17T21:15:00Z",
            "min_latitude": 10.0, "min_longitude": -70.5,
            "max_latitude": 10.5, "max_longitude": -70.0,
            "min_depth": 12.0, "max_depth": 80.0
        }"#;
        let summary: SwathBathySummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.min_location, Geo::new(10.0, -70.5));
        assert_eq!(summary.max_location, Geo::new(10.5, -70.0));

        let nested = serde_json::to_value(&summary).unwrap();
        assert!(nested.get("min_location").is_some());
        assert!(nested.get("min_latitude").is_none());
    }

    #[test]
    fn test_svp_point_counts() {
        let svp = SoundVelocityProfile {
            observation_time: chrono::Utc.with_ymd_and_hms(2017, 3, 17, 0, 0, 0).unwrap(),
            application_time: chrono::Utc.with_ymd_and_hms(2017, 3, 17, 0, 0, 0).unwrap(),
            number_points: 3,
            depth: vec![0.0, 10.0, 20.0],
            sound_speed: vec![1500.0, 1499.5],
        };
        assert_eq!(
            svp.check_point_counts(),
            Err(SchemaError::PointCountMismatch {
                field: "sound_speed",
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn test_collection_document() {
        let collection = RecordCollection::new(vec![header_record()]);
        let json = serde_json::to_string(&collection).unwrap();
        let back = RecordCollection::from_json_str(&json).unwrap();
        assert_eq!(back, collection);
        assert_eq!(back.count_of(RecordType::Header), 1);
        assert_eq!(back.count_of(RecordType::SwathBathyPing), 0);

        let empty = RecordCollection::from_json_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
