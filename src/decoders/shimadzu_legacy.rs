//! Shimadzu LabSolutions ASCII exports from before sectioned tables.
//!
//! Sixteen tab-delimited `key:\tvalue\t...` lines, one value cell per channel,
//! followed by a single signal column with the channels stacked one after the
//! other. There is no time column; it is rebuilt from the sampling interval.

use std::collections::HashMap;
use std::path::Path;

use log::debug;

use super::text::{file_name, first_line, has_extension, parse_finite, read_text};
use super::DecodeError;
use crate::metadata::MetadataResolver;
use crate::trace::{melt_hplc, Normalizer, TracePoint, TraceTable};

const EXTENSIONS: &[&str] = &["asc"];

/// Number of key/value lines before the signal column.
pub(super) const HEADER_LINES: usize = 16;

/// First line of the sectioned format, which this decoder leaves alone.
pub(super) const SECTIONED_MARKER: &str = "[Header]";

mod keys {
    pub const SAMPLE_ID: &str = "Sample ID:";
    pub const ACQUIRED: &str = "Acquisition Date and Time:";
    pub const SAMPLING_RATE: &str = "Sampling Rate:";
    pub const DATA_POINTS: &str = "Total Data Points:";
}

#[derive(Debug, Clone, PartialEq)]
struct LegacyHeader {
    sample: String,
    run_identity: Option<String>,
    /// Seconds between points
    interval: f64,
    /// Points per stacked channel
    points_per_channel: Vec<usize>,
}

pub(super) fn claims(path: &Path) -> bool {
    has_extension(path, EXTENSIONS)
        && first_line(path).is_some_and(|line| line.trim() != SECTIONED_MARKER)
}

pub(super) fn decode(
    path: &Path,
    resolver: &mut MetadataResolver<'_>,
    normalizer: &Normalizer,
) -> Result<(TraceTable, Option<String>), DecodeError> {
    let text = read_text(path)?;
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < HEADER_LINES {
        return Err(DecodeError::malformed(
            path,
            format!("expected {} header lines, found {}", HEADER_LINES, lines.len()),
        ));
    }
    let header = prepare(path, &lines[..HEADER_LINES])?;

    let signals = lines[HEADER_LINES..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split('\t')
                .next()
                .and_then(parse_finite)
                .ok_or_else(|| DecodeError::malformed(path, format!("bad signal line '{}'", line.trim())))
        })
        .collect::<Result<Vec<f64>, _>>()?;
    if signals.is_empty() {
        return Err(DecodeError::Empty(path.display().to_string()));
    }

    let expected: usize = header.points_per_channel.iter().sum();
    if signals.len() != expected {
        return Err(DecodeError::malformed(
            path,
            format!("header announces {} points, found {}", expected, signals.len()),
        ));
    }

    let flow_rate = resolver.flow_rate(None, None, &file_name(path))?;
    let mapping = &resolver.explicit().channel_mapping;

    let mut points = Vec::with_capacity(signals.len());
    let mut signals = signals.into_iter();
    for (index, &count) in header.points_per_channel.iter().enumerate() {
        let letter = channel_letter(index);
        let channel = mapping.get(&letter).cloned().unwrap_or(letter);
        debug!("{}: channel '{}' with {} points", path.display(), channel, count);
        for (i, signal) in signals.by_ref().take(count).enumerate() {
            let time = i as f64 * header.interval / 60.0;
            points.push(TracePoint {
                time,
                volume: time * flow_rate,
                channel: channel.clone(),
                sample: header.sample.clone(),
                signal,
            });
        }
    }

    Ok((TraceTable::Hplc(melt_hplc(points, normalizer)), header.run_identity))
}

fn prepare(path: &Path, lines: &[&str]) -> Result<LegacyHeader, DecodeError> {
    let fields: HashMap<&str, Vec<&str>> = lines
        .iter()
        .filter_map(|line| {
            let mut cells = line.split('\t');
            let key = cells.next()?.trim();
            Some((key, cells.map(str::trim).collect()))
        })
        .collect();
    let first = |key: &str| {
        fields
            .get(key)
            .and_then(|cells| cells.first().copied())
            .filter(|cell| !cell.is_empty())
    };

    let sample = first(keys::SAMPLE_ID)
        .ok_or_else(|| DecodeError::malformed(path, format!("no '{}' line", keys::SAMPLE_ID)))?
        .to_string();
    let interval = first(keys::SAMPLING_RATE)
        .and_then(|cell| cell.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| DecodeError::malformed(path, format!("no usable '{}' line", keys::SAMPLING_RATE)))?;
    let points_per_channel: Vec<usize> = fields
        .get(keys::DATA_POINTS)
        .map(|cells| cells.iter().filter_map(|c| c.parse().ok()).collect())
        .unwrap_or_default();
    if points_per_channel.is_empty() {
        return Err(DecodeError::malformed(path, format!("no '{}' counts", keys::DATA_POINTS)));
    }

    Ok(LegacyHeader {
        sample,
        run_identity: first(keys::ACQUIRED).map(run_identity_from_timestamp),
        interval,
        points_per_channel,
    })
}

/// `5/12/2020 10:15:33 AM` becomes `5-12-2020_10-15-33_AM`.
pub(super) fn run_identity_from_timestamp(stamp: &str) -> String {
    stamp.replace('/', "-").replace(' ', "_").replace(':', "-")
}

/// `A`, `B`, ... for stacked channels.
fn channel_letter(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        format!("Ch{}", index + 1)
    }
}
