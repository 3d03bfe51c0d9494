use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::MetadataError;

/// File name of the per-user settings document in the home directory.
pub const SETTINGS_FILE_NAME: &str = ".lctrace-settings.json";

/// Outcome of looking a method name up in the flow-rate registry.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowRateMatch {
    /// No registered key is a substring of the method name
    NoMatch,
    /// Exactly one registered key matched
    Unique {
        /// Registered key that matched
        key: String,
        /// Flow rate in mL/min
        flow_rate: f64,
    },
    /// More than one registered key matched
    Ambiguous(Vec<String>),
}

/// Persisted per-user defaults.
///
/// Loaded once at the start of a run and written only by [`UserSettings::save`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Method-name substring to flow rate in mL/min
    #[serde(default)]
    flow_rates: BTreeMap<String, f64>,

    /// Default FPLC column volume in mL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_column_volume: Option<f64>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl UserSettings {
    /// Empty settings that are never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Default settings location, `~/.lctrace-settings.json`.
    pub fn default_path() -> Result<PathBuf, MetadataError> {
        dirs::home_dir()
            .map(|home| home.join(SETTINGS_FILE_NAME))
            .ok_or(MetadataError::NoHomeDirectory)
    }

    /// Load settings from the default location.
    pub fn load_default() -> Result<Self, MetadataError> {
        Self::load(Self::default_path()?)
    }

    /// Load settings from `path`. A missing file yields empty settings bound to `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let mut settings = match fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}; starting empty", path.display());
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        settings.path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Parse settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize settings to JSON.
    pub fn to_json(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Where [`save`](Self::save) writes, if anywhere.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the settings back to their file. In-memory settings are left alone.
    pub fn save(&self) -> Result<(), MetadataError> {
        let Some(path) = &self.path else {
            debug!("Settings are in-memory; nothing written");
            return Ok(());
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(self.to_json()?.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path)?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    // Flow rates ------------------------------------------------------------

    /// Registered flow rates keyed by method-name substring.
    pub fn flow_rates(&self) -> &BTreeMap<String, f64> {
        &self.flow_rates
    }

    /// Register or replace one flow rate.
    pub fn set_flow_rate(&mut self, method: &str, flow_rate: f64) -> Result<(), MetadataError> {
        if !(flow_rate.is_finite() && flow_rate > 0.0) {
            return Err(MetadataError::InvalidValue(format!(
                "flow rate must be a positive number, got {flow_rate}"
            )));
        }
        if method.is_empty() {
            return Err(MetadataError::InvalidValue(
                "flow rate key must not be empty".to_string(),
            ));
        }
        self.flow_rates.insert(method.to_string(), flow_rate);
        Ok(())
    }

    /// Merge several flow rates into the registry.
    pub fn update_flow_rates<I>(&mut self, flow_rates: I) -> Result<(), MetadataError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        for (method, flow_rate) in flow_rates {
            self.set_flow_rate(&method, flow_rate)?;
        }
        Ok(())
    }

    /// Remove a registered flow rate.
    pub fn delete_flow_rate(&mut self, method: &str) -> Result<f64, MetadataError> {
        self.flow_rates
            .remove(method)
            .ok_or_else(|| MetadataError::UnknownFlowRate(method.to_string()))
    }

    /// Find the registered flow rate whose key is contained in `method`.
    pub fn check_flow_rate(&self, method: &str) -> FlowRateMatch {
        let matches: Vec<(&String, &f64)> = self
            .flow_rates
            .iter()
            .filter(|(key, _)| method.contains(key.as_str()))
            .collect();
        debug!("Flow-rate registry matches for '{}': {:?}", method, matches);

        match matches.as_slice() {
            [] => FlowRateMatch::NoMatch,
            [(key, flow_rate)] => FlowRateMatch::Unique {
                key: (*key).clone(),
                flow_rate: **flow_rate,
            },
            _ => {
                warn!("More than one registered flow rate matches '{}'", method);
                FlowRateMatch::Ambiguous(matches.iter().map(|(k, _)| (*k).clone()).collect())
            }
        }
    }

    // Column volume ----------------------------------------------------------

    /// Default FPLC column volume in mL.
    pub fn default_column_volume(&self) -> Option<f64> {
        self.default_column_volume
    }

    /// Set or clear the default FPLC column volume.
    pub fn set_default_column_volume(&mut self, column_volume: Option<f64>) -> Result<(), MetadataError> {
        if let Some(cv) = column_volume {
            if !(cv.is_finite() && cv > 0.0) {
                return Err(MetadataError::InvalidValue(format!(
                    "column volume must be a positive number, got {cv}"
                )));
            }
        }
        self.default_column_volume = column_volume;
        Ok(())
    }
}
