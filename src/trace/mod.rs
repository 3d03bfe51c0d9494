//! # Canonical Trace Schema
//!
//! Every instrument decoder converges on the same long-form layout: one row per
//! (timepoint, normalization) pair, tagged by a [`Normalization`] discriminator.
//!
//! | Column | Type | Description |
//! |--------|------|-------------|
//! | Time | f64 | Retention time in minutes (HPLC only) |
//! | mL | f64 | Elution volume in mL |
//! | CV | f64 | Column volumes (FPLC only) |
//! | Channel | String | Detector output label |
//! | Fraction | u32 | Collected fraction, starting at 1 (FPLC only) |
//! | Sample | String | Sample name |
//! | Normalization | enum | `Signal` or `Normalized` |
//! | Value | f64 | Raw signal or min-max normalized value |
//!
//! For a fixed (Sample, Channel) pair there is exactly one `Signal` row and one
//! `Normalized` row per timepoint.

mod fraction;
mod normalize;


use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

pub use fraction::{assign_fractions, fraction_for, FRACTION_OFFSET};
pub use normalize::{NormWindow, Normalizer, DEFAULT_WINDOW_START_ML};

/// Column names shared by CSV export and the document codec.
pub mod columns {
    /// Retention time in minutes
    pub const TIME: &str = "Time";
    /// Elution volume in mL
    pub const VOLUME: &str = "mL";
    /// Column volumes
    pub const COLUMN_VOLUME: &str = "CV";
    /// Detector channel label
    pub const CHANNEL: &str = "Channel";
    /// Fraction number
    pub const FRACTION: &str = "Fraction";
    /// Sample name
    pub const SAMPLE: &str = "Sample";
    /// Normalization discriminator
    pub const NORMALIZATION: &str = "Normalization";
    /// Signal or normalized value
    pub const VALUE: &str = "Value";
}

/// Discriminates raw signal rows from normalized rows in long-form tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Normalization {
    /// Raw detector signal
    Signal,
    /// Min-max normalized signal in [0, 1] over the normalization window
    Normalized,
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalization::Signal => write!(f, "Signal"),
            Normalization::Normalized => write!(f, "Normalized"),
        }
    }
}

/// One long-form HPLC observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRow {
    /// Retention time in minutes
    #[serde(rename = "Time")]
    pub time: f64,
    /// Elution volume in mL
    #[serde(rename = "mL")]
    pub volume: f64,
    /// Detector channel label
    #[serde(rename = "Channel")]
    pub channel: String,
    /// Sample name
    #[serde(rename = "Sample")]
    pub sample: String,
    /// Whether `value` is raw or normalized
    #[serde(rename = "Normalization")]
    pub normalization: Normalization,
    /// Observed value
    #[serde(rename = "Value")]
    pub value: f64,
}

/// One long-form FPLC observation.
///
/// AKTA exports are volume-only, so there is no time column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FplcRow {
    /// Elution volume in mL
    #[serde(rename = "mL")]
    pub volume: f64,
    /// Elution volume divided by the column volume
    #[serde(rename = "CV")]
    pub column_volume: f64,
    /// Detector channel label (`mAU`, `mS/cm`, `%`)
    #[serde(rename = "Channel")]
    pub channel: String,
    /// Collected fraction, starting at 1
    #[serde(rename = "Fraction")]
    pub fraction: u32,
    /// Sample name
    #[serde(rename = "Sample")]
    pub sample: String,
    /// Whether `value` is raw or normalized
    #[serde(rename = "Normalization")]
    pub normalization: Normalization,
    /// Observed value
    #[serde(rename = "Value")]
    pub value: f64,
}

/// A raw HPLC sample point before normalization and melting.
#[derive(Debug, Clone, PartialEq)]
pub struct TracePoint {
    /// Retention time in minutes
    pub time: f64,
    /// Elution volume in mL
    pub volume: f64,
    /// Detector channel label
    pub channel: String,
    /// Sample name
    pub sample: String,
    /// Raw detector signal
    pub signal: f64,
}

/// A raw FPLC sample point before normalization and melting.
#[derive(Debug, Clone, PartialEq)]
pub struct FplcPoint {
    /// Elution volume in mL
    pub volume: f64,
    /// Elution volume divided by the column volume
    pub column_volume: f64,
    /// Detector channel label
    pub channel: String,
    /// Collected fraction
    pub fraction: u32,
    /// Sample name
    pub sample: String,
    /// Raw detector signal
    pub signal: f64,
}

/// A decoded table destined for one of the two Experiment slots.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceTable {
    /// Analytical HPLC traces
    Hplc(Vec<TraceRow>),
    /// Preparative FPLC traces
    Fplc(Vec<FplcRow>),
}

/// Reasons a table fails the canonical schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaViolation {
    /// Table holds no rows
    #[error("table has no rows")]
    Empty,

    /// A value that must be finite is NaN or infinite
    #[error("non-finite {column} in row {row}")]
    NonFinite {
        /// Column holding the bad value
        column: &'static str,
        /// Row index
        row: usize,
    },

    /// A timepoint lacks its Signal/Normalized counterpart or repeats one
    #[error("sample '{sample}' channel '{channel}' has {signal} Signal and {normalized} Normalized rows at one timepoint")]
    UnpairedNormalization {
        /// Sample name
        sample: String,
        /// Channel label
        channel: String,
        /// Signal rows seen at that timepoint
        signal: usize,
        /// Normalized rows seen at that timepoint
        normalized: usize,
    },

    /// Fraction numbers start at 1
    #[error("fraction 0 in row {0}")]
    ZeroFraction(usize),
}

impl TraceTable {
    /// Number of long-form rows.
    pub fn len(&self) -> usize {
        match self {
            TraceTable::Hplc(rows) => rows.len(),
            TraceTable::Fplc(rows) => rows.len(),
        }
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short slot name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            TraceTable::Hplc(_) => "HPLC",
            TraceTable::Fplc(_) => "FPLC",
        }
    }

    /// Check the canonical schema invariants.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        match self {
            TraceTable::Hplc(rows) => validate_hplc(rows),
            TraceTable::Fplc(rows) => validate_fplc(rows),
        }
    }
}

fn validate_hplc(rows: &[TraceRow]) -> Result<(), SchemaViolation> {
    if rows.is_empty() {
        return Err(SchemaViolation::Empty);
    }
    for (i, row) in rows.iter().enumerate() {
        if !row.time.is_finite() {
            return Err(SchemaViolation::NonFinite { column: columns::TIME, row: i });
        }
        if !row.volume.is_finite() {
            return Err(SchemaViolation::NonFinite { column: columns::VOLUME, row: i });
        }
    }
    check_pairing(rows.iter().map(|r| {
        (
            (r.sample.as_str(), r.channel.as_str(), r.time.to_bits(), r.volume.to_bits()),
            r.normalization,
        )
    }))
}

fn validate_fplc(rows: &[FplcRow]) -> Result<(), SchemaViolation> {
    if rows.is_empty() {
        return Err(SchemaViolation::Empty);
    }
    for (i, row) in rows.iter().enumerate() {
        if !row.volume.is_finite() {
            return Err(SchemaViolation::NonFinite { column: columns::VOLUME, row: i });
        }
        if !row.column_volume.is_finite() {
            return Err(SchemaViolation::NonFinite { column: columns::COLUMN_VOLUME, row: i });
        }
        if row.fraction == 0 {
            return Err(SchemaViolation::ZeroFraction(i));
        }
    }
    check_pairing(rows.iter().map(|r| {
        (
            (r.sample.as_str(), r.channel.as_str(), r.volume.to_bits(), r.column_volume.to_bits()),
            r.normalization,
        )
    }))
}

fn check_pairing<'a>(
    keys: impl Iterator<Item = ((&'a str, &'a str, u64, u64), Normalization)>,
) -> Result<(), SchemaViolation> {
    let mut counts: HashMap<(&str, &str, u64, u64), (usize, usize)> = HashMap::new();
    for (key, normalization) in keys {
        let entry = counts.entry(key).or_default();
        match normalization {
            Normalization::Signal => entry.0 += 1,
            Normalization::Normalized => entry.1 += 1,
        }
    }
    match counts.into_iter().find(|(_, (s, n))| *s != 1 || *n != 1) {
        None => Ok(()),
        Some(((sample, channel, _, _), (signal, normalized))) => {
            Err(SchemaViolation::UnpairedNormalization {
                sample: sample.to_string(),
                channel: channel.to_string(),
                signal,
                normalized,
            })
        }
    }
}

/// Group item indices by key, keeping groups in order of first appearance.
pub(crate) fn group_indices<K, I>(keys: I) -> Vec<(K, Vec<usize>)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = K>,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<usize>)> = Vec::new();
    for (i, key) in keys.into_iter().enumerate() {
        match positions.get(&key) {
            Some(&g) => groups[g].1.push(i),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, vec![i]));
            }
        }
    }
    groups
}

/// Normalize each (Sample, Channel) group and melt into long form.
///
/// All `Signal` rows come first, followed by all `Normalized` rows, matching
/// the order of a column melt.
pub fn melt_hplc(points: Vec<TracePoint>, normalizer: &Normalizer) -> Vec<TraceRow> {
    let normalized = normalize_grouped(
        points.iter().map(|p| (p.sample.as_str(), p.channel.as_str())),
        |i| (points[i].volume, points[i].signal),
        points.len(),
        normalizer,
    );

    let mut rows = Vec::with_capacity(points.len() * 2);
    for p in &points {
        rows.push(TraceRow {
            time: p.time,
            volume: p.volume,
            channel: p.channel.clone(),
            sample: p.sample.clone(),
            normalization: Normalization::Signal,
            value: p.signal,
        });
    }
    for (p, value) in points.into_iter().zip(normalized) {
        rows.push(TraceRow {
            time: p.time,
            volume: p.volume,
            channel: p.channel,
            sample: p.sample,
            normalization: Normalization::Normalized,
            value,
        });
    }
    rows
}

/// FPLC counterpart of [`melt_hplc`].
pub fn melt_fplc(points: Vec<FplcPoint>, normalizer: &Normalizer) -> Vec<FplcRow> {
    let normalized = normalize_grouped(
        points.iter().map(|p| (p.sample.as_str(), p.channel.as_str())),
        |i| (points[i].volume, points[i].signal),
        points.len(),
        normalizer,
    );

    let mut rows = Vec::with_capacity(points.len() * 2);
    for p in &points {
        rows.push(FplcRow {
            volume: p.volume,
            column_volume: p.column_volume,
            channel: p.channel.clone(),
            fraction: p.fraction,
            sample: p.sample.clone(),
            normalization: Normalization::Signal,
            value: p.signal,
        });
    }
    for (p, value) in points.into_iter().zip(normalized) {
        rows.push(FplcRow {
            volume: p.volume,
            column_volume: p.column_volume,
            channel: p.channel,
            fraction: p.fraction,
            sample: p.sample,
            normalization: Normalization::Normalized,
            value,
        });
    }
    rows
}

/// Run the normalizer over each group of `keys` independently.
///
/// `point` maps an item index to its (volume, signal) pair. The returned vector
/// is indexed like the input.
pub(crate) fn normalize_grouped<'a, I, F>(
    keys: I,
    point: F,
    len: usize,
    normalizer: &Normalizer,
) -> Vec<f64>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
    F: Fn(usize) -> (f64, f64),
{
    let mut out = vec![0.0; len];
    for (_, indices) in group_indices(keys) {
        let (volumes, signals): (Vec<f64>, Vec<f64>) = indices.iter().map(|&i| point(i)).unzip();
        let values = normalizer.normalize(&volumes, &signals);
        for (&i, v) in indices.iter().zip(values) {
            out[i] = v;
        }
    }
    out
}
