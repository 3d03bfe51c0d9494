//! TOML configuration file support.
//!
//! Settings that would otherwise be repeated on every `process` invocation can
//! live in a config file. Command-line flags override file values.
//!
//! ```toml
//! # lctrace.toml
//! [processing]
//! flow_rate = 0.5
//! column_volume = 24.0
//! agilent_channel = "GFP"
//! preferred_detector = "RF-20A"
//! normalize = [0.5, 20.0]
//! strict = false
//! scale_hplc = 1.0
//!
//! [processing.channel_mapping]
//! A = "Trp"
//! B = "GFP"
//!
//! [store]
//! path = "~/experiments"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration structure for lctrace.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Processing settings.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Document store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Configuration for the process command.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessingConfig {
    /// HPLC flow rate in mL/min, applied to every HPLC file.
    pub flow_rate: Option<f64>,

    /// FPLC column volume in mL.
    pub column_volume: Option<f64>,

    /// Channel label for Agilent exports.
    pub agilent_channel: Option<String>,

    /// Detector that wins Shimadzu channel conflicts.
    pub preferred_detector: Option<String>,

    /// Shimadzu legacy channel letter renames.
    #[serde(default)]
    pub channel_mapping: BTreeMap<String, String>,

    /// Normalization window in mL.
    pub normalize: Option<[f64; 2]>,

    /// Take the normalization floor from the window too.
    pub strict: Option<bool>,

    /// Factor applied to HPLC signal.
    pub scale_hplc: Option<f64>,
}

/// Configuration for the document store.
#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `<id>.json` documents.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
