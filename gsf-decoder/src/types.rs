//! Core types for the GSF record decoder library
//!
//! This module defines the error taxonomy shared by every layer of the
//! pipeline, the crate-wide `Result` alias and the timestamp type.

use crate::records::RecordType;
use chrono::{DateTime, Utc};
use std::fmt;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur while reading, validating or emitting records
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    /// A negative status returned by the native decoder
    #[error("[{code}] {message} ({context})")]
    Native {
        /// Original native status code, preserved for diagnostics
        code: i32,
        /// Fixed description from the status table
        message: &'static str,
        /// Which call produced the status
        context: String,
    },

    #[error("Schema validation failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("Malformed record payload: {0}")]
    Payload(serde_json::Error),

    #[error("Session is closed")]
    SessionClosed,

    #[error("{0} requires a session opened in indexed mode")]
    NotIndexed(&'static str),

    #[error("Failed to load native library: {0}")]
    Library(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of a [`DecoderError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Native status code or unreadable payload
    Decoder,
    /// Record violated a schema invariant
    SchemaValidation,
    /// Session misuse or unavailable native library
    Resource,
    /// Filesystem failure
    Io,
    /// Downstream consumer failure
    Sink,
}

impl DecoderError {
    /// Build an error from a native status code
    pub fn native(code: i32, context: impl Into<String>) -> Self {
        DecoderError::Native {
            code,
            message: crate::lookup::describe_error(code),
            context: context.into(),
        }
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecoderError::Native { .. } | DecoderError::Payload(_) => ErrorKind::Decoder,
            DecoderError::Schema(_) => ErrorKind::SchemaValidation,
            DecoderError::SessionClosed
            | DecoderError::NotIndexed(_)
            | DecoderError::Library(_) => ErrorKind::Resource,
            DecoderError::IoError(_) => ErrorKind::Io,
            DecoderError::Csv(_) | DecoderError::Sink(_) => ErrorKind::Sink,
        }
    }

    /// The native status code carried by this error, if any
    pub fn code(&self) -> Option<i32> {
        match self {
            DecoderError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DecoderError {
    fn from(e: serde_json::Error) -> Self {
        // Well-formed JSON with the wrong shape is a schema problem, anything
        // else means the payload itself is broken.
        match e.classify() {
            serde_json::error::Category::Data => {
                DecoderError::Schema(SchemaError::InvalidField(e.to_string()))
            }
            _ => DecoderError::Payload(e),
        }
    }
}

/// Record-level invariant violations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("field `{field}` has {actual} values but the ping has {expected} beams")]
    BeamCountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("field `{field}` has {actual} values but the profile has {expected} points")]
    PointCountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("record declares {declared} but {found} body is populated")]
    VariantMismatch {
        declared: RecordType,
        found: RecordType,
    },

    #[error("multiple record bodies populated: {0}")]
    MultipleVariants(MultipleVariants),

    #[error("record declares {0} but no body is populated")]
    MissingBody(RecordType),

    #[error("unrecognized record type code {0}")]
    UnknownRecordType(i32),

    #[error("{0}")]
    InvalidField(String),
}

/// The slot names found populated in a single record
#[derive(Debug, Clone, PartialEq)]
pub struct MultipleVariants(pub Vec<&'static str>);

impl fmt::Display for MultipleVariants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}
