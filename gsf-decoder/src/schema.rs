//! Static field classification for swath bathymetry pings
//!
//! Each ping field is tagged exactly once in [`PING_FIELDS`], in declaration
//! order. The flattening engine only ever consults this table; nothing
//! inspects field types at run time.

use crate::records::{QualityFlags, SensorData, SwathBathyPing};
use crate::types::{SchemaError, Timestamp};
use chrono::SecondsFormat;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;

/// How a ping field participates in tabular output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Always present, one value per ping
    Scalar,
    /// May be absent, one value per ping
    OptionalScalar,
    /// May be absent, one value per beam
    PerBeamArray,
    /// Structured sub-object expanded into its own columns
    Nested,
    /// Never emitted
    Excluded,
}

/// Every field of a [`SwathBathyPing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PingField {
    Height,
    Sep,
    NumberBeams,
    CenterBeam,
    PingFlags,
    Reserved,
    TideCorrector,
    GpsTideCorrector,
    DepthCorrector,
    Heading,
    Pitch,
    Roll,
    Heave,
    Course,
    Speed,
    Depth,
    NominalDepth,
    AcrossTrack,
    AlongTrack,
    TravelTime,
    BeamAngle,
    McAmplitude,
    MrAmplitude,
    EchoWidth,
    QualityFactor,
    ReceiveHeave,
    DepthError,
    AcrossTrackError,
    AlongTrackError,
    QualityFlags,
    BeamFlags,
    SignalToNoise,
    BeamAngleForward,
    VerticalError,
    HorizontalError,
    SectorNumber,
    DetectionInfo,
    IncidentBeamAdj,
    SystemCleaning,
    DopplerCorr,
    SonarVertUncert,
    SonarHorizUncert,
    DetectionWindow,
    MeanAbsCoeff,
    SensorId,
    SensorData,
}

/// One row of the ping schema table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: PingField,
    pub name: &'static str,
    pub class: FieldClass,
}

const fn spec(field: PingField, name: &'static str, class: FieldClass) -> FieldSpec {
    FieldSpec { field, name, class }
}

use FieldClass::{Excluded, Nested, OptionalScalar, PerBeamArray, Scalar};

/// Ping schema in declaration order
pub const PING_FIELDS: &[FieldSpec] = &[
    spec(PingField::Height, "height", Scalar),
    spec(PingField::Sep, "sep", Excluded),
    spec(PingField::NumberBeams, "number_beams", Scalar),
    spec(PingField::CenterBeam, "center_beam", Scalar),
    spec(PingField::PingFlags, "ping_flags", OptionalScalar),
    spec(PingField::Reserved, "reserved", Excluded),
    spec(PingField::TideCorrector, "tide_corrector", Scalar),
    spec(PingField::GpsTideCorrector, "gps_tide_corrector", Scalar),
    spec(PingField::DepthCorrector, "depth_corrector", Scalar),
    spec(PingField::Heading, "heading", Scalar),
    spec(PingField::Pitch, "pitch", Scalar),
    spec(PingField::Roll, "roll", Scalar),
    spec(PingField::Heave, "heave", Scalar),
    spec(PingField::Course, "course", Scalar),
    spec(PingField::Speed, "speed", Scalar),
    spec(PingField::Depth, "depth", PerBeamArray),
    spec(PingField::NominalDepth, "nominal_depth", PerBeamArray),
    spec(PingField::AcrossTrack, "across_track", PerBeamArray),
    spec(PingField::AlongTrack, "along_track", PerBeamArray),
    spec(PingField::TravelTime, "travel_time", PerBeamArray),
    spec(PingField::BeamAngle, "beam_angle", PerBeamArray),
    spec(PingField::McAmplitude, "mc_amplitude", PerBeamArray),
    spec(PingField::MrAmplitude, "mr_amplitude", PerBeamArray),
    spec(PingField::EchoWidth, "echo_width", PerBeamArray),
    spec(PingField::QualityFactor, "quality_factor", PerBeamArray),
    spec(PingField::ReceiveHeave, "receive_heave", PerBeamArray),
    spec(PingField::DepthError, "depth_error", PerBeamArray),
    spec(PingField::AcrossTrackError, "across_track_error", PerBeamArray),
    spec(PingField::AlongTrackError, "along_track_error", PerBeamArray),
    spec(PingField::QualityFlags, "quality_flags", PerBeamArray),
    spec(PingField::BeamFlags, "beam_flags", PerBeamArray),
    spec(PingField::SignalToNoise, "signal_to_noise", OptionalScalar),
    spec(PingField::BeamAngleForward, "beam_angle_forward", PerBeamArray),
    spec(PingField::VerticalError, "vertical_error", PerBeamArray),
    spec(PingField::HorizontalError, "horizontal_error", PerBeamArray),
    spec(PingField::SectorNumber, "sector_number", PerBeamArray),
    spec(PingField::DetectionInfo, "detection_info", PerBeamArray),
    spec(PingField::IncidentBeamAdj, "incident_beam_adj", PerBeamArray),
    spec(PingField::SystemCleaning, "system_cleaning", PerBeamArray),
    spec(PingField::DopplerCorr, "doppler_corr", PerBeamArray),
    spec(PingField::SonarVertUncert, "sonar_vert_uncert", PerBeamArray),
    spec(PingField::SonarHorizUncert, "sonar_horiz_uncert", PerBeamArray),
    spec(PingField::DetectionWindow, "detection_window", PerBeamArray),
    spec(PingField::MeanAbsCoeff, "mean_abs_coeff", PerBeamArray),
    spec(PingField::SensorId, "sensor_id", Scalar),
    spec(PingField::SensorData, "sensor_data", Nested),
];

impl PingField {
    /// Schema entry for this field
    pub fn spec(self) -> &'static FieldSpec {
        // PING_FIELDS lists the enum variants in declaration order
        &PING_FIELDS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn class(self) -> FieldClass {
        self.spec().class
    }

    /// Native subrecord id carrying this per-beam array
    pub fn subrecord_id(self) -> Option<i32> {
        let id = match self {
            PingField::Depth => 1,
            PingField::AcrossTrack => 2,
            PingField::AlongTrack => 3,
            PingField::TravelTime => 4,
            PingField::BeamAngle => 5,
            PingField::McAmplitude => 6,
            PingField::MrAmplitude => 7,
            PingField::EchoWidth => 8,
            PingField::QualityFactor => 9,
            PingField::ReceiveHeave => 10,
            PingField::DepthError => 11,
            PingField::AcrossTrackError => 12,
            PingField::AlongTrackError => 13,
            PingField::NominalDepth => 14,
            PingField::QualityFlags => 15,
            PingField::BeamFlags => 16,
            PingField::SignalToNoise => 17,
            PingField::BeamAngleForward => 18,
            PingField::VerticalError => 19,
            PingField::HorizontalError => 20,
            PingField::SectorNumber => 22,
            PingField::DetectionInfo => 23,
            PingField::IncidentBeamAdj => 24,
            PingField::SystemCleaning => 25,
            PingField::DopplerCorr => 26,
            PingField::SonarVertUncert => 27,
            PingField::SonarHorizUncert => 28,
            PingField::DetectionWindow => 29,
            PingField::MeanAbsCoeff => 30,
            _ => return None,
        };
        Some(id)
    }
}

/// Schema entries holding per-beam arrays
pub fn per_beam_fields() -> impl Iterator<Item = &'static FieldSpec> {
    PING_FIELDS.iter().filter(|s| s.class == PerBeamArray)
}

/// A single tabular value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Time(Timestamp),
    List(Vec<Cell>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            // Debug keeps the decimal point on whole numbers ("1.0", not "1")
            Cell::Float(v) => write!(f, "{:?}", v),
            Cell::Text(v) => write!(f, "{}", v),
            Cell::Time(v) => write!(f, "{}", v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Cell::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Int(v) => serializer.serialize_i64(*v),
            Cell::Float(v) => serializer.serialize_f64(*v),
            Cell::Text(v) => serializer.serialize_str(v),
            Cell::Time(v) => {
                serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Cell::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Borrowed view of one per-beam array
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeamSeries<'a> {
    Float(&'a [f64]),
    Int(&'a [i64]),
    /// One flag character per beam
    Flags(&'a str),
}

impl<'a> BeamSeries<'a> {
    pub fn len(&self) -> usize {
        match self {
            BeamSeries::Float(values) => values.len(),
            BeamSeries::Int(values) => values.len(),
            BeamSeries::Flags(flags) => flags.chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for one beam; out of range yields `Cell::Null`
    pub fn cell(&self, beam: usize) -> Cell {
        match self {
            BeamSeries::Float(values) => values.get(beam).map_or(Cell::Null, |v| Cell::Float(*v)),
            BeamSeries::Int(values) => values.get(beam).map_or(Cell::Null, |v| Cell::Int(*v)),
            BeamSeries::Flags(flags) => flags
                .chars()
                .nth(beam)
                .map_or(Cell::Null, |c| Cell::Text(c.to_string())),
        }
    }

    /// The whole ordered sequence as one cell
    pub fn to_list(&self) -> Cell {
        match self {
            BeamSeries::Float(values) => Cell::List(values.iter().map(|v| Cell::Float(*v)).collect()),
            BeamSeries::Int(values) => Cell::List(values.iter().map(|v| Cell::Int(*v)).collect()),
            BeamSeries::Flags(flags) => {
                Cell::List(flags.chars().map(|c| Cell::Text(c.to_string())).collect())
            }
        }
    }
}

/// The value of one ping field, shaped by its classification
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Absent,
    Scalar(Cell),
    Beams(BeamSeries<'a>),
    Sensor(&'a SensorData),
}

impl FieldValue<'_> {
    pub fn is_present(&self) -> bool {
        !matches!(self, FieldValue::Absent)
    }
}

fn floats(values: &Option<Vec<f64>>) -> FieldValue<'_> {
    values
        .as_deref()
        .map_or(FieldValue::Absent, |v| FieldValue::Beams(BeamSeries::Float(v)))
}

fn ints(values: &Option<Vec<i64>>) -> FieldValue<'_> {
    values
        .as_deref()
        .map_or(FieldValue::Absent, |v| FieldValue::Beams(BeamSeries::Int(v)))
}

fn flags(values: &Option<QualityFlags>) -> FieldValue<'_> {
    match values {
        Some(QualityFlags::Text(flags)) => FieldValue::Beams(BeamSeries::Flags(flags)),
        Some(QualityFlags::Codes(codes)) => FieldValue::Beams(BeamSeries::Int(codes)),
        None => FieldValue::Absent,
    }
}

impl SwathBathyPing {
    /// Read one field through the schema
    pub fn value(&self, field: PingField) -> FieldValue<'_> {
        let float = |v: f64| FieldValue::Scalar(Cell::Float(v));
        let int = |v: i64| FieldValue::Scalar(Cell::Int(v));

        match field {
            PingField::Height => float(self.height),
            PingField::Sep => float(self.sep),
            PingField::NumberBeams => int(self.number_beams.into()),
            PingField::CenterBeam => int(self.center_beam.into()),
            PingField::PingFlags => self.ping_flags.map_or(FieldValue::Absent, int),
            PingField::Reserved => int(self.reserved),
            PingField::TideCorrector => float(self.tide_corrector),
            PingField::GpsTideCorrector => float(self.gps_tide_corrector),
            PingField::DepthCorrector => float(self.depth_corrector),
            PingField::Heading => float(self.heading),
            PingField::Pitch => float(self.pitch),
            PingField::Roll => float(self.roll),
            PingField::Heave => float(self.heave),
            PingField::Course => float(self.course),
            PingField::Speed => float(self.speed),
            PingField::Depth => floats(&self.depth),
            PingField::NominalDepth => floats(&self.nominal_depth),
            PingField::AcrossTrack => floats(&self.across_track),
            PingField::AlongTrack => floats(&self.along_track),
            PingField::TravelTime => floats(&self.travel_time),
            PingField::BeamAngle => floats(&self.beam_angle),
            PingField::McAmplitude => floats(&self.mc_amplitude),
            PingField::MrAmplitude => floats(&self.mr_amplitude),
            PingField::EchoWidth => floats(&self.echo_width),
            PingField::QualityFactor => floats(&self.quality_factor),
            PingField::ReceiveHeave => floats(&self.receive_heave),
            PingField::DepthError => floats(&self.depth_error),
            PingField::AcrossTrackError => floats(&self.across_track_error),
            PingField::AlongTrackError => floats(&self.along_track_error),
            PingField::QualityFlags => flags(&self.quality_flags),
            PingField::BeamFlags => ints(&self.beam_flags),
            PingField::SignalToNoise => self.signal_to_noise.map_or(FieldValue::Absent, float),
            PingField::BeamAngleForward => floats(&self.beam_angle_forward),
            PingField::VerticalError => floats(&self.vertical_error),
            PingField::HorizontalError => floats(&self.horizontal_error),
            PingField::SectorNumber => ints(&self.sector_number),
            PingField::DetectionInfo => ints(&self.detection_info),
            PingField::IncidentBeamAdj => floats(&self.incident_beam_adj),
            PingField::SystemCleaning => ints(&self.system_cleaning),
            PingField::DopplerCorr => floats(&self.doppler_corr),
            PingField::SonarVertUncert => floats(&self.sonar_vert_uncert),
            PingField::SonarHorizUncert => floats(&self.sonar_horiz_uncert),
            PingField::DetectionWindow => floats(&self.detection_window),
            PingField::MeanAbsCoeff => floats(&self.mean_abs_coeff),
            PingField::SensorId => int(self.sensor_id.into()),
            PingField::SensorData => self
                .sensor_data
                .as_ref()
                .map_or(FieldValue::Absent, FieldValue::Sensor),
        }
    }

    /// Per-beam array for `field`, if present
    pub fn beams(&self, field: PingField) -> Option<BeamSeries<'_>> {
        match self.value(field) {
            FieldValue::Beams(series) => Some(series),
            _ => None,
        }
    }

    /// Every present per-beam array must hold exactly `number_beams` values
    pub fn check_beam_lengths(&self) -> Result<(), SchemaError> {
        let expected = self.number_beams as usize;
        for spec in per_beam_fields() {
            if let Some(series) = self.beams(spec.field) {
                if series.len() != expected {
                    return Err(SchemaError::BeamCountMismatch {
                        field: spec.name,
                        expected,
                        actual: series.len(),
                    });
                }
            }
        }
        Ok(())
    }
}
