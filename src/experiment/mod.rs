//! # Experiment Aggregate
//!
//! An [`Experiment`] owns at most one HPLC table and at most one FPLC table for
//! one logical run. Tables from several exports (and several instruments) are
//! appended into the same slot, then renormalized together.
//!
//! ## Example
//!
//! ```rust
//! use lctrace::experiment::Experiment;
//! use lctrace::trace::{melt_hplc, Normalizer, TracePoint, TraceTable};
//!
//! let points = (0..10)
//!     .map(|i| TracePoint {
//!         time: i as f64,
//!         volume: i as f64 * 0.5,
//!         channel: "A280".to_string(),
//!         sample: "SEC_01".to_string(),
//!         signal: (i * i) as f64,
//!     })
//!     .collect();
//!
//! let mut experiment = Experiment::new("2024/06/01 run");
//! experiment.append(TraceTable::Hplc(melt_hplc(points, &Normalizer::default())))?;
//! experiment.renormalize_hplc(&Normalizer::default())?;
//!
//! assert_eq!(experiment.id(), "2024-06-01 run");
//! assert_eq!(experiment.to_string(), "Experiment \"2024-06-01 run\" with HPLC data");
//! # Ok::<(), lctrace::experiment::ExperimentError>(())
//! ```

mod error;
mod export;


use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use log::debug;

use crate::codec::CURRENT_VERSION;
use crate::trace::{
    group_indices, normalize_grouped, FplcRow, Normalization, Normalizer, TraceRow, TraceTable,
};

pub use error::ExperimentError;
pub use export::CsvExports;

/// One logical run: zero or one HPLC table and zero or one FPLC table.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    id: String,
    /// Document layout version this experiment was loaded from or will be saved as
    pub version: u32,
    hplc: Option<Vec<TraceRow>>,
    fplc: Option<Vec<FplcRow>>,
}

/// Signal-only pivot with one column per `"<Sample> <Channel>"`, keyed by time.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    /// Column names, sorted
    pub columns: Vec<String>,
    /// Rows sorted by time
    pub rows: Vec<WideRow>,
}

/// One timepoint of a [`WideTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    /// Retention time in minutes
    pub time: f64,
    /// Mean signal per column, `None` where the series has no point at this time
    pub values: Vec<Option<f64>>,
}

/// Replace path separators so the id can name files.
pub fn sanitize_id(id: &str) -> String {
    id.replace(['/', '\\'], "-")
}

impl Experiment {
    /// Empty experiment at the current document version.
    pub fn new(id: &str) -> Self {
        Self {
            id: sanitize_id(id),
            version: CURRENT_VERSION,
            hplc: None,
            fplc: None,
        }
    }

    pub(crate) fn from_parts(
        id: &str,
        version: u32,
        hplc: Option<Vec<TraceRow>>,
        fplc: Option<Vec<FplcRow>>,
    ) -> Self {
        Self {
            id: sanitize_id(id),
            version,
            hplc: hplc.filter(|rows| !rows.is_empty()),
            fplc: fplc.filter(|rows| !rows.is_empty()),
        }
    }

    /// Filesystem-safe identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// HPLC rows, if any.
    pub fn hplc(&self) -> Option<&[TraceRow]> {
        self.hplc.as_deref()
    }

    /// FPLC rows, if any.
    pub fn fplc(&self) -> Option<&[FplcRow]> {
        self.fplc.as_deref()
    }

    /// Whether neither slot holds data.
    pub fn is_empty(&self) -> bool {
        self.hplc.is_none() && self.fplc.is_none()
    }

    /// Replace the HPLC slot, keeping it sorted.
    pub fn set_hplc(&mut self, rows: Option<Vec<TraceRow>>) {
        self.hplc = rows.filter(|r| !r.is_empty()).map(|mut rows| {
            sort_hplc(&mut rows);
            rows
        });
    }

    /// Replace the FPLC slot.
    pub fn set_fplc(&mut self, rows: Option<Vec<FplcRow>>) {
        self.fplc = rows.filter(|r| !r.is_empty());
    }

    /// Merge a decoded table into its slot, concatenating with existing rows.
    ///
    /// The table must satisfy the canonical schema; it is rejected, not
    /// coerced, otherwise.
    pub fn append(&mut self, table: TraceTable) -> Result<(), ExperimentError> {
        table.validate()?;
        debug!("Appending {} {} rows to {}", table.len(), table.kind(), self.id);
        match table {
            TraceTable::Hplc(rows) => {
                let slot = self.hplc.get_or_insert_with(Vec::new);
                slot.extend(rows);
                sort_hplc(slot);
            }
            TraceTable::Fplc(rows) => {
                self.fplc.get_or_insert_with(Vec::new).extend(rows);
            }
        }
        Ok(())
    }

    /// Re-derive HPLC `Normalized` values from stored `Signal` values.
    ///
    /// Row count and every other column are left untouched.
    pub fn renormalize_hplc(&mut self, normalizer: &Normalizer) -> Result<(), ExperimentError> {
        let rows = self.hplc.as_mut().ok_or(ExperimentError::NoData("HPLC"))?;
        renormalize(rows, normalizer);
        Ok(())
    }

    /// FPLC counterpart of [`renormalize_hplc`](Self::renormalize_hplc).
    pub fn renormalize_fplc(&mut self, normalizer: &Normalizer) -> Result<(), ExperimentError> {
        let rows = self.fplc.as_mut().ok_or(ExperimentError::NoData("FPLC"))?;
        renormalize(rows, normalizer);
        Ok(())
    }

    /// Decimate each (Sample, Channel, Normalization) HPLC group to about
    /// `target_points` rows with a uniform stride.
    pub fn reduce_hplc(&mut self, target_points: usize) -> Result<(), ExperimentError> {
        if target_points == 0 {
            return Err(ExperimentError::InvalidArgument(
                "target point count must be at least 1".to_string(),
            ));
        }
        let Some(rows) = self.hplc.as_mut() else {
            return Ok(());
        };

        let mut keep = vec![false; rows.len()];
        let groups = group_indices(
            rows.iter()
                .map(|r| (r.sample.as_str(), r.channel.as_str(), r.normalization)),
        );
        for (_, indices) in groups {
            let stride = indices.len().div_ceil(target_points);
            for &i in indices.iter().step_by(stride) {
                keep[i] = true;
            }
        }

        let mut flags = keep.into_iter();
        rows.retain(|_| flags.next().unwrap_or(false));
        Ok(())
    }

    /// A reduced copy for previews. `self` keeps full resolution.
    pub fn preview(&self, target_points: usize) -> Result<Experiment, ExperimentError> {
        let mut preview = self.clone();
        preview.reduce_hplc(target_points)?;
        Ok(preview)
    }

    /// Pivot HPLC `Signal` rows to one column per `"<Sample> <Channel>"`.
    ///
    /// Duplicate (time, column) observations are averaged.
    pub fn wide_projection(&self) -> Result<WideTable, ExperimentError> {
        let rows = self.hplc.as_deref().ok_or(ExperimentError::NoData("HPLC"))?;
        let signal: Vec<&TraceRow> = rows
            .iter()
            .filter(|r| r.normalization == Normalization::Signal)
            .collect();

        let columns: Vec<String> = signal
            .iter()
            .map(|r| wide_column(r))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let column_index: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut cells: HashMap<u64, Vec<(f64, usize)>> = HashMap::new();
        for row in &signal {
            let column = wide_column(row);
            let Some(&c) = column_index.get(column.as_str()) else {
                continue;
            };
            let acc = cells
                .entry(row.time.to_bits())
                .or_insert_with(|| vec![(0.0, 0); columns.len()]);
            acc[c].0 += row.value;
            acc[c].1 += 1;
        }

        let mut times: Vec<f64> = cells.keys().map(|&bits| f64::from_bits(bits)).collect();
        times.sort_by(f64::total_cmp);

        let rows = times
            .into_iter()
            .map(|time| {
                let values = cells
                    .get(&time.to_bits())
                    .map(|acc| {
                        acc.iter()
                            .map(|&(sum, n)| (n > 0).then(|| sum / n as f64))
                            .collect()
                    })
                    .unwrap_or_default();
                WideRow { time, values }
            })
            .collect();

        Ok(WideTable { columns, rows })
    }

    /// Rename HPLC channels. Channels missing from `mapping` keep their name.
    pub fn rename_channels(&mut self, mapping: &BTreeMap<String, String>) {
        if let Some(rows) = self.hplc.as_mut() {
            for row in rows.iter_mut() {
                if let Some(name) = mapping.get(&row.channel) {
                    row.channel = name.clone();
                }
            }
            sort_hplc(rows);
        }
    }

    /// Merge several experiments into one called `concat`.
    ///
    /// HPLC samples are prefixed with `"<id>: "`; FPLC samples are replaced by
    /// the source experiment's id.
    pub fn concat(experiments: &[Experiment]) -> Experiment {
        let mut merged = Experiment::new("concat");

        let hplc: Vec<TraceRow> = experiments
            .iter()
            .filter_map(|e| e.hplc.as_ref().map(|rows| (e.id.as_str(), rows)))
            .flat_map(|(id, rows)| {
                rows.iter().map(move |r| TraceRow {
                    sample: format!("{}: {}", id, r.sample),
                    ..r.clone()
                })
            })
            .collect();
        let fplc: Vec<FplcRow> = experiments
            .iter()
            .filter_map(|e| e.fplc.as_ref().map(|rows| (e.id.as_str(), rows)))
            .flat_map(|(id, rows)| {
                rows.iter().map(move |r| FplcRow {
                    sample: id.to_string(),
                    ..r.clone()
                })
            })
            .collect();

        merged.set_hplc(Some(hplc));
        merged.set_fplc(Some(fplc));
        merged
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let contents = match (&self.hplc, &self.fplc) {
            (Some(_), Some(_)) => "HPLC and FPLC",
            (Some(_), None) => "HPLC",
            (None, Some(_)) => "FPLC",
            (None, None) => "no",
        };
        write!(f, "Experiment \"{}\" with {} data", self.id, contents)
    }
}

fn wide_column(row: &TraceRow) -> String {
    format!("{} {}", row.sample, row.channel)
}

/// Normalization, then channel, then volume. Stable.
fn sort_hplc(rows: &mut [TraceRow]) {
    rows.sort_by(|a, b| {
        a.normalization
            .cmp(&b.normalization)
            .then_with(|| a.channel.cmp(&b.channel))
            .then_with(|| a.volume.total_cmp(&b.volume))
    });
}

/// Long-form row access shared by both table kinds.
trait LongRow {
    fn sample(&self) -> &str;
    fn channel(&self) -> &str;
    fn normalization(&self) -> Normalization;
    fn volume(&self) -> f64;
    fn value(&self) -> f64;
    fn set_value(&mut self, value: f64);
    /// Position along the trace, identical for a Signal row and its Normalized twin
    fn position(&self) -> (u64, u64);
}

impl LongRow for TraceRow {
    fn sample(&self) -> &str {
        &self.sample
    }
    fn channel(&self) -> &str {
        &self.channel
    }
    fn normalization(&self) -> Normalization {
        self.normalization
    }
    fn volume(&self) -> f64 {
        self.volume
    }
    fn value(&self) -> f64 {
        self.value
    }
    fn set_value(&mut self, value: f64) {
        self.value = value;
    }
    fn position(&self) -> (u64, u64) {
        (self.time.to_bits(), self.volume.to_bits())
    }
}

impl LongRow for FplcRow {
    fn sample(&self) -> &str {
        &self.sample
    }
    fn channel(&self) -> &str {
        &self.channel
    }
    fn normalization(&self) -> Normalization {
        self.normalization
    }
    fn volume(&self) -> f64 {
        self.volume
    }
    fn value(&self) -> f64 {
        self.value
    }
    fn set_value(&mut self, value: f64) {
        self.value = value;
    }
    fn position(&self) -> (u64, u64) {
        (self.volume.to_bits(), self.column_volume.to_bits())
    }
}

fn renormalize<R: LongRow>(rows: &mut [R], normalizer: &Normalizer) {
    let signal: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.normalization() == Normalization::Signal)
        .map(|(i, _)| i)
        .collect();
    let values = normalize_grouped(
        signal.iter().map(|&i| (rows[i].sample(), rows[i].channel())),
        |k| (rows[signal[k]].volume(), rows[signal[k]].value()),
        signal.len(),
        normalizer,
    );

    let by_position: HashMap<(&str, &str, (u64, u64)), f64> = signal
        .iter()
        .zip(values)
        .map(|(&i, v)| ((rows[i].sample(), rows[i].channel(), rows[i].position()), v))
        .collect();
    let updates: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.normalization() == Normalization::Normalized)
        .filter_map(|(i, r)| {
            by_position
                .get(&(r.sample(), r.channel(), r.position()))
                .map(|&v| (i, v))
        })
        .collect();

    for (i, v) in updates {
        rows[i].set_value(v);
    }
}
