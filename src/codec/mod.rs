//! # Experiment Documents
//!
//! Converts an [`Experiment`] to and from the JSON document kept in a
//! document store. The `version` field is the compatibility contract:
//!
//! | Version | HPLC payload | FPLC payload | Decode |
//! |---------|--------------|--------------|--------|
//! | 4 (current) | pivot: `mL`, `Channel`, `Time`, `Normalization` + one column per sample | rows | melt back to long form |
//! | 3 (legacy) | rows | rows | read as-is, should be re-saved |
//! | older / missing | - | - | [`CodecError::StaleFormat`] |
//!
//! The pivot stores the four index columns once instead of once per sample.
//!
//! ## Document shape
//!
//! ```json
//! {
//!   "_id": "Plate3",
//!   "version": 4,
//!   "hplc": {"mL": [0.0, 0.0], "Channel": ["UV", "UV"], "Time": [0.0, 0.0],
//!            "Normalization": ["Signal", "Normalized"], "SEC_08": [1.2, 0.0]},
//!   "fplc": null,
//!   "saved": "2024-06-01T12:00:00Z"
//! }
//! ```

mod columns;
mod error;


use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::experiment::Experiment;
use crate::trace::{FplcRow, TraceRow, TraceTable};
use crate::trace::columns as trace_columns;

pub use error::CodecError;

/// Layout version written by [`ExperimentDocument::encode`].
pub const CURRENT_VERSION: u32 = 4;

/// The one older layout that still decodes.
pub const LEGACY_VERSION: u32 = 3;

/// How a stored document relates to the current layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentVersion {
    /// Written by this version of the codec
    Current,
    /// One version old; decodes but should be re-saved
    Legacy,
    /// Older or unversioned; needs a migration outside the codec
    Stale(Option<u32>),
}

/// Persisted form of an [`Experiment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDocument {
    /// Experiment id, also the store key
    #[serde(rename = "_id")]
    pub id: String,

    /// Layout version
    #[serde(default)]
    pub version: Option<u32>,

    /// HPLC payload, layout depends on `version`
    #[serde(default)]
    pub hplc: Option<Value>,

    /// FPLC payload, row-wise
    #[serde(default)]
    pub fplc: Option<Value>,

    /// When the document was encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<DateTime<Utc>>,
}

impl ExperimentDocument {
    /// Encode at [`CURRENT_VERSION`].
    ///
    /// Fails with [`CodecError::Malformed`] when any value is NaN or infinite.
    pub fn encode(experiment: &Experiment) -> Result<Self, CodecError> {
        ensure_finite(experiment)?;
        let hplc = experiment.hplc().map(columns::pivot).transpose()?;
        let fplc = experiment.fplc().map(serde_json::to_value).transpose()?;
        Ok(Self {
            id: experiment.id().to_string(),
            version: Some(CURRENT_VERSION),
            hplc,
            fplc,
            saved: Some(Utc::now()),
        })
    }

    /// Encode at [`LEGACY_VERSION`], for stores that still serve older readers.
    pub fn encode_legacy(experiment: &Experiment) -> Result<Self, CodecError> {
        ensure_finite(experiment)?;
        let hplc = experiment.hplc().map(serde_json::to_value).transpose()?;
        let fplc = experiment.fplc().map(serde_json::to_value).transpose()?;
        Ok(Self {
            id: experiment.id().to_string(),
            version: Some(LEGACY_VERSION),
            hplc,
            fplc,
            saved: Some(Utc::now()),
        })
    }

    /// Where this document falls relative to the current layout.
    pub fn layout(&self) -> DocumentVersion {
        match self.version {
            Some(CURRENT_VERSION) => DocumentVersion::Current,
            Some(LEGACY_VERSION) => DocumentVersion::Legacy,
            other => DocumentVersion::Stale(other),
        }
    }

    /// Rebuild the experiment, branching on `version`.
    pub fn decode(&self) -> Result<Experiment, CodecError> {
        let (hplc, fplc) = match self.layout() {
            DocumentVersion::Current => {
                debug!("Decoding '{}' at version {}", self.id, CURRENT_VERSION);
                let hplc = payload(&self.hplc)?.map(|v| columns::melt(&v)).transpose()?;
                let fplc = payload(&self.fplc)?
                    .map(|v| columns::records::<FplcRow>(&v))
                    .transpose()?;
                (hplc, fplc)
            }
            DocumentVersion::Legacy => {
                info!(
                    "Experiment '{}' uses version {} and should be re-saved",
                    self.id, LEGACY_VERSION
                );
                let hplc = payload(&self.hplc)?
                    .map(|v| columns::records::<TraceRow>(&v))
                    .transpose()?;
                let fplc = payload(&self.fplc)?
                    .map(|v| columns::records::<FplcRow>(&v))
                    .transpose()?;
                (hplc, fplc)
            }
            DocumentVersion::Stale(version) => {
                return Err(CodecError::StaleFormat {
                    id: self.id.clone(),
                    version,
                })
            }
        };

        build(&self.id, self.version, hplc, fplc)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Encode `experiment` at the current version.
pub fn encode(experiment: &Experiment) -> Result<ExperimentDocument, CodecError> {
    ExperimentDocument::encode(experiment)
}

/// Decode a stored document.
pub fn decode(document: &ExperimentDocument) -> Result<Experiment, CodecError> {
    document.decode()
}

fn build(
    id: &str,
    version: Option<u32>,
    hplc: Option<Vec<TraceRow>>,
    fplc: Option<Vec<FplcRow>>,
) -> Result<Experiment, CodecError> {
    let hplc = hplc.filter(|rows| !rows.is_empty());
    let fplc = fplc.filter(|rows| !rows.is_empty());
    if let Some(rows) = &hplc {
        TraceTable::Hplc(rows.clone()).validate()?;
    }
    if let Some(rows) = &fplc {
        TraceTable::Fplc(rows.clone()).validate()?;
    }
    let mut experiment =
        Experiment::from_parts(id, version.unwrap_or(CURRENT_VERSION), None, fplc);
    experiment.set_hplc(hplc);
    Ok(experiment)
}

/// Absent, `null` and `""` all mean "no table". A JSON string holding JSON is
/// unwrapped, which is how dataframe exporters embed their payloads.
fn payload(value: &Option<Value>) -> Result<Option<Value>, CodecError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(serde_json::from_str(s)?)),
        Some(other) => Ok(Some(other.clone())),
    }
}

/// JSON writes non-finite numbers as `null`, which would not decode back.
fn ensure_finite(experiment: &Experiment) -> Result<(), CodecError> {
    let bad = |slot: &str, row: usize, column: &str| {
        CodecError::Malformed(format!("{} row {} has a non-finite {}", slot, row, column))
    };
    for (i, row) in experiment.hplc().unwrap_or_default().iter().enumerate() {
        for (column, value) in [
            (trace_columns::TIME, row.time),
            (trace_columns::VOLUME, row.volume),
            (trace_columns::VALUE, row.value),
        ] {
            if !value.is_finite() {
                return Err(bad("HPLC", i, column));
            }
        }
    }
    for (i, row) in experiment.fplc().unwrap_or_default().iter().enumerate() {
        for (column, value) in [
            (trace_columns::VOLUME, row.volume),
            (trace_columns::COLUMN_VOLUME, row.column_volume),
            (trace_columns::VALUE, row.value),
        ] {
            if !value.is_finite() {
                return Err(bad("FPLC", i, column));
            }
        }
    }
    Ok(())
}
