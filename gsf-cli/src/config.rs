//! Configuration loading and parsing
//!
//! Every setting here has a command-line counterpart; flags given on the
//! command line win over the file.

use anyhow::{Context, Result};
use gsf_decoder::FormatVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub decoder: DecoderSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DecoderSection {
    /// "03.08", "03.09" or "03.10"
    pub version: Option<FormatVersion>,
    /// Directory holding `libgsf-<arch>-<version>.so`
    pub library_dir: Option<PathBuf>,
    /// One explicit library, overriding `library_dir`
    pub library_file: Option<PathBuf>,
    pub buffer_size: Option<usize>,
    #[serde(default)]
    pub include_denormalized_fields: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputSection {
    /// Where CSV files go when no explicit prefix is given
    pub directory: Option<PathBuf>,
    /// Add record type and sensor name label columns
    #[serde(default)]
    pub include_labels: bool,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if let Some(dir) = &config.decoder.library_dir {
        if !dir.is_dir() {
            log::warn!("Configured library_dir does not exist: {:?}", dir);
        }
    }

    Ok(config)
}
