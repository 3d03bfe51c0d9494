//! Cytiva AKTA UNICORN exports.
//!
//! ```text
//! Chrom.1   <TAB>         Chrom.1  <TAB>          Chrom.1 <TAB>      Chrom.1
//! UV 1_280  <TAB>         Cond     <TAB>          Conc B  <TAB>      Fractions
//! ml        mAU           ml       mS/cm          ml      %          ml     Fraction
//! 0.000     -0.012        0.000    15.2           0.000   0.0        0.000  A1
//! ```
//!
//! The instrument samples each channel on its own cadence, so every value
//! column comes with its own `ml` column immediately to its left.

use std::path::Path;

use log::{debug, warn};

use super::text::{file_name, file_stem, first_cell, first_line, has_extension, parse_finite, read_text};
use super::DecodeError;
use crate::metadata::MetadataResolver;
use crate::trace::{assign_fractions, melt_fplc, FplcPoint, Normalizer, TraceTable};

const EXTENSIONS: &[&str] = &["csv"];

/// First cell of every UNICORN export.
pub(super) const SIGNATURE: &str = "Chrom.1";

/// Zero-based line holding the unit header.
const HEADER_ROW: usize = 2;

/// Value columns kept, by unit suffix.
const CHANNEL_UNITS: &[&str] = &["mAU", "mS/cm", "%"];

const FRACTION_COLUMN: &str = "Fraction";
const VOLUME_PREFIX: &str = "ml";

/// A value column paired with its volume column.
#[derive(Debug, Clone, PartialEq)]
struct ChannelColumns {
    channel: String,
    volume: usize,
    value: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct AktaLayout {
    channels: Vec<ChannelColumns>,
    /// Volume column of the fraction marks
    fractions: Option<usize>,
}

pub(super) fn claims(path: &Path) -> bool {
    has_extension(path, EXTENSIONS)
        && first_line(path)
            .as_deref()
            .and_then(first_cell)
            .is_some_and(|cell| cell == SIGNATURE)
}

pub(super) fn decode(
    path: &Path,
    resolver: &mut MetadataResolver<'_>,
    normalizer: &Normalizer,
) -> Result<(TraceTable, Option<String>), DecodeError> {
    let text = read_text(path)?;
    let records = read_records(&text)?;
    if records.len() <= HEADER_ROW {
        return Err(DecodeError::malformed(path, "missing unit header row"));
    }
    let layout = prepare(path, &records[1], &records[HEADER_ROW])?;
    let rows = &records[HEADER_ROW + 1..];

    let boundaries: Vec<f64> = layout
        .fractions
        .map(|col| rows.iter().filter_map(|r| number(r, col)).collect())
        .unwrap_or_default();
    debug!("{}: {} fraction marks", path.display(), boundaries.len());

    let column_volume = resolver.column_volume(&file_name(path))?;
    let sample = file_stem(path);

    let mut points = Vec::new();
    for columns in &layout.channels {
        let (volumes, signals): (Vec<f64>, Vec<f64>) = rows
            .iter()
            .filter_map(|r| Some((number(r, columns.volume)?, number(r, columns.value)?)))
            .unzip();
        let fractions = assign_fractions(&volumes, &boundaries);

        let before = points.len();
        for ((volume, signal), fraction) in volumes.into_iter().zip(signals).zip(fractions) {
            let cv = volume / column_volume;
            // wash and equilibration fall outside one column volume
            if !(0.0..=1.0).contains(&cv) {
                continue;
            }
            points.push(FplcPoint {
                volume,
                column_volume: cv,
                channel: columns.channel.clone(),
                fraction,
                sample: sample.clone(),
                signal,
            });
        }
        debug!("{}: kept {} points for '{}'", path.display(), points.len() - before, columns.channel);
    }
    if points.is_empty() {
        return Err(DecodeError::Empty(path.display().to_string()));
    }

    Ok((TraceTable::Fplc(melt_fplc(points, normalizer)), Some(sample)))
}

fn read_records(text: &str) -> Result<Vec<Vec<String>>, DecodeError> {
    let delimiter = match text.lines().nth(HEADER_ROW) {
        Some(line) if !line.contains('\t') && line.contains(',') => b',',
        _ => b'\t',
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .records()
        .map(|record| -> Result<Vec<String>, DecodeError> {
            Ok(record?.iter().map(|c| c.trim().to_string()).collect())
        })
        .collect()
}

fn prepare(path: &Path, names: &[String], units: &[String]) -> Result<AktaLayout, DecodeError> {
    let mut channels: Vec<ChannelColumns> = Vec::new();
    let mut fractions = None;

    for (i, unit) in units.iter().enumerate() {
        let Some(volume) = i.checked_sub(1).filter(|&v| units[v].starts_with(VOLUME_PREFIX)) else {
            continue;
        };
        if unit == FRACTION_COLUMN {
            fractions = Some(volume);
        } else if let Some(suffix) = CHANNEL_UNITS.iter().find(|u| unit.ends_with(*u)) {
            let mut channel = suffix.to_string();
            if channels.iter().any(|c| c.channel == channel) {
                // second detector with the same unit, name it after its curve
                let curve = names.get(volume).map(String::as_str).unwrap_or("");
                channel = format!("{} {}", curve, suffix).trim().to_string();
                warn!("{}: repeated '{}' column named '{}'", path.display(), suffix, channel);
            }
            channels.push(ChannelColumns {
                channel,
                volume,
                value: i,
            });
        }
    }

    if channels.is_empty() {
        return Err(DecodeError::malformed(path, "no mAU, mS/cm or % columns"));
    }
    Ok(AktaLayout { channels, fractions })
}

fn number(record: &[String], column: usize) -> Option<f64> {
    record
        .get(column)
        .and_then(|cell| parse_finite(cell))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(line: &str) -> Vec<String> {
        line.split('\t').map(str::to_string).collect()
    }

    #[test]
    fn test_prepare_pairs_volume_columns() {
        let names = cells("UV 1_280\t\tCond\t\tConc B\t\tFractions\t");
        let units = cells("ml\tmAU\tml\tmS/cm\tml\t%\tml\tFraction");
        let layout = prepare(Path::new("run.csv"), &names, &units).unwrap();

        let channels: Vec<(&str, usize, usize)> = layout
            .channels
            .iter()
            .map(|c| (c.channel.as_str(), c.volume, c.value))
            .collect();
        assert_eq!(channels, vec![("mAU", 0, 1), ("mS/cm", 2, 3), ("%", 4, 5)]);
        assert_eq!(layout.fractions, Some(6));
    }

    #[test]
    fn test_prepare_names_repeated_units() {
        let names = cells("UV 1_280\t\tUV 2_260\t");
        let units = cells("ml\tmAU\tml\tmAU");
        let layout = prepare(Path::new("run.csv"), &names, &units).unwrap();
        assert_eq!(layout.channels[0].channel, "mAU");
        assert_eq!(layout.channels[1].channel, "UV 2_260 mAU");
    }

    #[test]
    fn test_prepare_rejects_no_channels() {
        let result = prepare(Path::new("run.csv"), &[], &cells("ml\tFraction"));
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_comma_export_detected() {
        let text = "Chrom.1,,Chrom.1\nUV,,Cond\nml,mAU,ml,mS/cm\n0.1,2.0,0.1,3.0\n";
        let records = read_records(text).unwrap();
        assert_eq!(records[2], vec!["ml", "mAU", "ml", "mS/cm"]);
        assert_eq!(number(&records[3], 3), Some(3.0));
    }
}
