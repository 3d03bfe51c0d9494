//! Waters Empower `.arw` exports.
//!
//! ```text
//! "SampleName"  "Channel"              "Instrument Method Name"        "Sample Set Name"
//! "SEC_08"      "2475ChA ex280/em350"  "Sup6Inc_10_300_TrpGFP_LineA"   "Plate3"
//! 0.0000        -0.0123
//! 0.0167        0.0051
//! ```
//!
//! The file carries no flow rate; it is resolved from the instrument method name.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, error};

use super::text::{file_name, has_extension, parse_pair, read_text};
use super::DecodeError;
use crate::metadata::MetadataResolver;
use crate::trace::{melt_hplc, Normalizer, TracePoint, TraceTable};

const EXTENSIONS: &[&str] = &["arw"];

/// Header cells the decoder reads.
mod keys {
    pub const SAMPLE_NAME: &str = "SampleName";
    pub const CHANNEL: &str = "Channel";
    pub const METHOD: &str = "Instrument Method Name";
    pub const SAMPLE_SET: &str = "Sample Set Name";
}

#[derive(Debug, Clone, PartialEq)]
struct WatersHeader {
    sample: String,
    channel: String,
    method: Option<String>,
    sample_set: Option<String>,
}

pub(super) fn claims(path: &Path) -> bool {
    has_extension(path, EXTENSIONS)
}

pub(super) fn decode(
    path: &Path,
    resolver: &mut MetadataResolver<'_>,
    normalizer: &Normalizer,
) -> Result<(TraceTable, Option<String>), DecodeError> {
    let text = read_text(path)?;
    let mut lines = text.lines();
    let names = lines.next().ok_or_else(|| DecodeError::malformed(path, "missing header row"))?;
    let values = lines.next().ok_or_else(|| DecodeError::malformed(path, "missing header values"))?;
    let header = prepare(path, names, values)?;

    let samples = data_pairs(path, lines)?;
    if samples.is_empty() {
        return Err(DecodeError::Empty(path.display().to_string()));
    }

    let flow_rate = resolver.flow_rate(header.method.as_deref(), None, &file_name(path))?;
    debug!(
        "{}: {} points, channel '{}', {} mL/min",
        path.display(),
        samples.len(),
        header.channel,
        flow_rate
    );

    let points = samples
        .into_iter()
        .map(|(time, signal)| TracePoint {
            time,
            volume: time * flow_rate,
            channel: header.channel.clone(),
            sample: header.sample.clone(),
            signal,
        })
        .collect();

    Ok((TraceTable::Hplc(melt_hplc(points, normalizer)), header.sample_set))
}

fn prepare(path: &Path, names: &str, values: &str) -> Result<WatersHeader, DecodeError> {
    let names = header_cells(names)?;
    let values = header_cells(values)?;
    let cells: HashMap<&str, &str> = names
        .iter()
        .map(String::as_str)
        .zip(values.iter().map(String::as_str))
        .collect();
    let cell = |key: &str| cells.get(key).map(|v| v.to_string()).filter(|v| !v.is_empty());

    let sample = cell(keys::SAMPLE_NAME)
        .ok_or_else(|| DecodeError::malformed(path, format!("no '{}' header", keys::SAMPLE_NAME)))?;
    let channel = cell(keys::CHANNEL)
        .map(|raw| strip_detector_id(&raw).to_string())
        .ok_or_else(|| DecodeError::malformed(path, format!("no '{}' header", keys::CHANNEL)))?;
    let sample_set = cell(keys::SAMPLE_SET);
    if sample_set.is_none() {
        error!("No '{}' found in {}", keys::SAMPLE_SET, path.display());
    }

    Ok(WatersHeader {
        sample,
        channel,
        method: cell(keys::METHOD),
        sample_set,
    })
}

fn header_cells(line: &str) -> Result<Vec<String>, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|c| c.trim().to_string()).collect()),
        None => Ok(Vec::new()),
    }
}

/// `"2475ChA ex280/em350"` becomes `"ex280/em350"`. Other labels pass through.
pub(super) fn strip_detector_id(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.split_once(char::is_whitespace) {
        Some((_, rest)) if is_ex_em(rest.trim()) => rest.trim(),
        _ => raw,
    }
}

fn is_ex_em(label: &str) -> bool {
    let lower = label.to_ascii_lowercase();
    match lower.strip_prefix("ex").and_then(|rest| rest.split_once("/em")) {
        Some((ex, em)) => {
            !ex.is_empty()
                && !em.is_empty()
                && ex.chars().all(|c| c.is_ascii_digit())
                && em.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Every non-blank line after the header must be a (time, signal) pair.
pub(super) fn data_pairs<'a>(
    path: &Path,
    lines: impl Iterator<Item = &'a str>,
) -> Result<Vec<(f64, f64)>, DecodeError> {
    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            parse_pair(line).ok_or_else(|| DecodeError::malformed(path, format!("bad data line '{}'", line.trim())))
        })
        .collect()
}
