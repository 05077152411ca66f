//! Session and flattening configuration
//!
//! The format version is an explicit parameter of every session; there is
//! no process-wide "current version". Each version maps to a small
//! capability table describing how the native decoder must be driven.

use crate::codec::PayloadFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// On-disk format revisions with distinct native adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormatVersion {
    #[serde(rename = "03.08", alias = "V1", alias = "v1")]
    V1,
    #[serde(rename = "03.09", alias = "V2", alias = "v2")]
    V2,
    #[default]
    #[serde(rename = "03.10", alias = "V3", alias = "v3")]
    V3,
}

/// Which native open call a version uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStyle {
    /// `gsfOpen` / `gsfOpenBuffered`
    Plain,
    /// `gsfOpenForJson` with buffer size and output options
    ForJson,
}

/// How to drive the native decoder for one format version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub open_style: OpenStyle,
    pub payload: PayloadFormat,
    /// Whether the open call can add denormalized sensor fields
    pub denormalized_fields: bool,
}

impl FormatVersion {
    pub const ALL: [FormatVersion; 3] = [FormatVersion::V1, FormatVersion::V2, FormatVersion::V3];

    /// Library version tag, e.g. "03.10"
    pub fn tag(self) -> &'static str {
        match self {
            FormatVersion::V1 => "03.08",
            FormatVersion::V2 => "03.09",
            FormatVersion::V3 => "03.10",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            FormatVersion::V1 => Capabilities {
                open_style: OpenStyle::Plain,
                payload: PayloadFormat::Slotted,
                denormalized_fields: false,
            },
            FormatVersion::V2 => Capabilities {
                open_style: OpenStyle::Plain,
                payload: PayloadFormat::Enveloped,
                denormalized_fields: false,
            },
            FormatVersion::V3 => Capabilities {
                open_style: OpenStyle::ForJson,
                payload: PayloadFormat::Enveloped,
                denormalized_fields: true,
            },
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for FormatVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches("GSF-v").to_lowercase();
        match normalized.as_str() {
            "03.08" | "3.08" | "v1" => Ok(FormatVersion::V1),
            "03.09" | "3.09" | "v2" => Ok(FormatVersion::V2),
            "03.10" | "3.10" | "v3" => Ok(FormatVersion::V3),
            _ => Err(format!(
                "unsupported GSF version '{}' (expected 03.08, 03.09 or 03.10)",
                s
            )),
        }
    }
}

/// Native file access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// Plain sequential reads
    #[default]
    Sequential,
    /// Reads backed by the record index; enables per-type counts
    Indexed,
}

impl FileMode {
    /// Native access mode constant
    pub fn native_code(self) -> i32 {
        match self {
            FileMode::Sequential => 2,
            FileMode::Indexed => 4,
        }
    }
}

/// Options passed through to the native open call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Read buffer size in bytes; `None` uses the library default
    #[serde(default)]
    pub buffer_size: Option<usize>,

    /// Ask the decoder for model-specific fields alongside the generic schema
    #[serde(default)]
    pub include_denormalized_fields: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the read buffer size
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = Some(bytes);
        self
    }

    /// Builder method: request denormalized sensor fields
    pub fn with_denormalized_fields(mut self, enabled: bool) -> Self {
        self.include_denormalized_fields = enabled;
        self
    }
}

/// Everything needed to open a decoder session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub mode: FileMode,
    #[serde(default)]
    pub version: FormatVersion,
    #[serde(default)]
    pub options: OpenOptions,
}

impl SessionConfig {
    /// Sequential read of the default format version
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the access mode
    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method: set the format version
    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    /// Builder method: set the open options
    pub fn with_options(mut self, options: OpenOptions) -> Self {
        self.options = options;
        self
    }
}

/// Options for the flattening engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenOptions {
    /// Add `record_type` and `sensor_name` label columns
    #[serde(default)]
    pub include_labels: bool,
}

impl FlattenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add label columns
    pub fn with_labels(mut self, enabled: bool) -> Self {
        self.include_labels = enabled;
        self
    }
}
