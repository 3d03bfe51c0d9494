//! Shimadzu LabSolutions multi-table exports.
//!
//! The file is a sequence of `[Section]` blocks of tab-delimited key/value
//! lines. One `[LC Chromatogram(<detector>-Ch<n>)]` block per recorded channel
//! holds its own parameters followed by an `R.Time (min)` table.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};

use super::shimadzu_legacy::SECTIONED_MARKER;
use super::text::{file_name, first_line, has_extension, parse_pair, read_text};
use super::DecodeError;
use crate::metadata::MetadataResolver;
use crate::trace::{group_indices, melt_hplc, Normalizer, TracePoint, TraceTable};

const EXTENSIONS: &[&str] = &["txt", "asc"];

mod keys {
    pub const SAMPLE_INFORMATION: &str = "Sample Information";
    pub const SAMPLE_NAME: &str = "Sample Name";
    pub const SAMPLE_ID: &str = "Sample ID";
    pub const ORIGINAL_FILES: &str = "Original Files";
    pub const BATCH_FILE: &str = "Batch File";
    pub const METHOD_FILE: &str = "Method File";
    pub const CONFIGURATION: &str = "Configuration";
    pub const DETECTOR_ID: &str = "Detector ID";
    pub const DETECTOR_NAME: &str = "Detector Name";
    pub const CHROMATOGRAM: &str = "LC Chromatogram";
    pub const POINTS: &str = "# of Points";
    pub const EX_WAVELENGTH: &str = "Ex. Wavelength";
    pub const EM_WAVELENGTH: &str = "Em. Wavelength";
    pub const WAVELENGTH: &str = "Wavelength";
    pub const TABLE_START: &str = "R.Time";
}

/// One `[Name]` block and the lines under it.
#[derive(Debug)]
struct Section<'t> {
    name: &'t str,
    lines: Vec<&'t str>,
}

impl<'t> Section<'t> {
    /// Cells after the key on the first line whose key starts with `key`.
    fn cells(&self, key: &str) -> Option<Vec<&'t str>> {
        self.lines.iter().find_map(|line| {
            let mut cells = line.split('\t');
            let first = cells.next()?.trim();
            first
                .starts_with(key)
                .then(|| cells.map(str::trim).collect())
        })
    }

    /// First cell after `key`, if present and non-empty.
    fn value(&self, key: &str) -> Option<&'t str> {
        self.cells(key)
            .and_then(|cells| cells.first().copied())
            .filter(|v| !v.is_empty())
    }
}

/// A single channel ready to be resolved.
#[derive(Debug, Clone, PartialEq)]
struct Chromatogram {
    detector: String,
    label: String,
    samples: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
struct ModernHeader {
    sample: String,
    batch: Option<String>,
    method: Option<String>,
}

pub(super) fn claims(path: &Path) -> bool {
    has_extension(path, EXTENSIONS)
        && first_line(path).is_some_and(|line| line.trim() == SECTIONED_MARKER)
}

pub(super) fn decode(
    path: &Path,
    resolver: &mut MetadataResolver<'_>,
    normalizer: &Normalizer,
) -> Result<(TraceTable, Option<String>), DecodeError> {
    let text = read_text(path)?;
    let sections = split_sections(&text);
    let header = prepare(path, &sections)?;

    let chromatograms = chromatograms(path, &sections)?;
    if chromatograms.iter().all(|c| c.samples.is_empty()) {
        return Err(DecodeError::Empty(path.display().to_string()));
    }
    let chromatograms = resolve_conflicts(chromatograms, resolver)?;

    let flow_rate = resolver.flow_rate(header.method.as_deref(), None, &file_name(path))?;

    let mut points = Vec::new();
    for chrom in chromatograms {
        debug!(
            "{}: {} points for '{}' from {}",
            path.display(),
            chrom.samples.len(),
            chrom.label,
            chrom.detector
        );
        for (time, signal) in chrom.samples {
            points.push(TracePoint {
                time,
                volume: time * flow_rate,
                channel: chrom.label.clone(),
                sample: header.sample.clone(),
                signal,
            });
        }
    }

    Ok((TraceTable::Hplc(melt_hplc(points, normalizer)), header.batch))
}

fn split_sections(text: &str) -> Vec<Section<'_>> {
    let mut sections: Vec<Section<'_>> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            sections.push(Section {
                name: trimmed.trim_start_matches('[').trim_end_matches(']').trim(),
                lines: Vec::new(),
            });
        } else if let Some(section) = sections.last_mut() {
            section.lines.push(line);
        }
    }
    sections
}

fn find<'s, 't>(sections: &'s [Section<'t>], name: &str) -> Option<&'s Section<'t>> {
    sections.iter().find(|s| s.name == name)
}

fn prepare(path: &Path, sections: &[Section<'_>]) -> Result<ModernHeader, DecodeError> {
    let info = find(sections, keys::SAMPLE_INFORMATION)
        .ok_or_else(|| DecodeError::malformed(path, format!("no [{}] section", keys::SAMPLE_INFORMATION)))?;
    let name = info
        .value(keys::SAMPLE_NAME)
        .ok_or_else(|| DecodeError::malformed(path, "no sample name"))?;
    let id = info.value(keys::SAMPLE_ID).unwrap_or("");
    let sample = sample_name(name, id);

    let originals = find(sections, keys::ORIGINAL_FILES);
    let batch = originals
        .and_then(|s| s.value(keys::BATCH_FILE))
        .map(windows_stem);
    let method = originals
        .and_then(|s| s.value(keys::METHOD_FILE))
        .map(windows_stem);
    if batch.is_none() {
        info!("No batch file recorded in {}", path.display());
    }

    Ok(ModernHeader { sample, batch, method })
}

/// `name`, or `name_id` when the id is non-empty and differs from the name.
pub(super) fn sample_name(name: &str, id: &str) -> String {
    if id.is_empty() || id == name {
        name.to_string()
    } else {
        format!("{}_{}", name, id)
    }
}

/// Stem of a path recorded by the instrument PC, which uses `\` separators.
pub(super) fn windows_stem(recorded: &str) -> String {
    let name = recorded
        .rsplit(|c| c == '\\' || c == '/')
        .next()
        .unwrap_or(recorded);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

fn chromatograms(path: &Path, sections: &[Section<'_>]) -> Result<Vec<Chromatogram>, DecodeError> {
    let config = find(sections, keys::CONFIGURATION);
    let ids = config
        .and_then(|s| s.cells(keys::DETECTOR_ID))
        .unwrap_or_default();
    let names = config
        .and_then(|s| s.cells(keys::DETECTOR_NAME))
        .unwrap_or_default();
    let detector_names: HashMap<&str, &str> = ids.iter().copied().zip(names.iter().copied()).collect();

    let mut out = Vec::new();
    for (index, section) in sections
        .iter()
        .filter(|s| s.name.starts_with(keys::CHROMATOGRAM))
        .enumerate()
    {
        let detector = section_detector(section.name)
            .or_else(|| ids.get(index).copied())
            .unwrap_or(section.name)
            .to_string();

        let label = match (section.value(keys::EX_WAVELENGTH), section.value(keys::EM_WAVELENGTH)) {
            (Some(ex), Some(em)) => ChannelLabel::ExEm(format!("Ex:{}/Em:{}", ex, em)),
            _ => ChannelLabel::Detector {
                name: detector_names
                    .get(detector.as_str())
                    .or_else(|| names.get(index))
                    .copied()
                    .unwrap_or(detector.as_str())
                    .to_string(),
                wavelength: section.value(keys::WAVELENGTH).map(str::to_string),
                channel: section_channel(section.name),
            },
        };

        let start = section
            .lines
            .iter()
            .position(|line| line.trim_start().starts_with(keys::TABLE_START))
            .ok_or_else(|| DecodeError::malformed(path, format!("[{}] has no data table", section.name)))?;
        let samples = section.lines[start + 1..]
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                parse_pair(line)
                    .ok_or_else(|| DecodeError::malformed(path, format!("bad data line '{}'", line.trim())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(expected) = section.value(keys::POINTS).and_then(|v| v.parse::<usize>().ok()) {
            if expected != samples.len() {
                warn!(
                    "[{}] in {} announces {} points but holds {}",
                    section.name,
                    path.display(),
                    expected,
                    samples.len()
                );
            }
        }

        out.push((detector, label, samples));
    }

    // detectors recording more than one plain channel
    let mut plain_counts: HashMap<String, usize> = HashMap::new();
    for (detector, label, _) in &out {
        if matches!(label, ChannelLabel::Detector { .. }) {
            *plain_counts.entry(detector.clone()).or_default() += 1;
        }
    }

    let mut seen: HashMap<String, u32> = HashMap::new();
    Ok(out
        .into_iter()
        .map(|(detector, label, samples)| {
            let label = match label {
                ChannelLabel::ExEm(label) => label,
                ChannelLabel::Detector { name, .. } if plain_counts.get(&detector).copied() == Some(1) => name,
                ChannelLabel::Detector {
                    name,
                    wavelength,
                    channel,
                } => {
                    let ordinal = seen.entry(detector.clone()).or_default();
                    *ordinal += 1;
                    match wavelength {
                        Some(nm) => format!("{} {}nm", name, nm),
                        None => format!("{} Ch{}", name, channel.unwrap_or(*ordinal)),
                    }
                }
            };
            Chromatogram {
                detector,
                label,
                samples,
            }
        })
        .collect())
}

/// How a chromatogram block names its channel before disambiguation.
#[derive(Debug, Clone, PartialEq)]
enum ChannelLabel {
    /// Fluorescence block with an excitation/emission pair
    ExEm(String),
    /// Anything else, named after its detector
    Detector {
        name: String,
        wavelength: Option<String>,
        channel: Option<u32>,
    },
}

/// `LC Chromatogram(Detector A-Ch2)` gives `2`.
fn section_channel(name: &str) -> Option<u32> {
    let inner = name.split_once('(')?.1.strip_suffix(')')?;
    inner.rsplit_once("-Ch")?.1.trim().parse().ok()
}

/// `LC Chromatogram(Detector A-Ch1)` gives `Detector A`.
fn section_detector(name: &str) -> Option<&str> {
    let inner = name.split_once('(')?.1.strip_suffix(')')?;
    let detector = match inner.rsplit_once("-Ch") {
        Some((detector, channel)) if channel.chars().all(|c| c.is_ascii_digit()) => detector,
        _ => inner,
    };
    Some(detector.trim()).filter(|d| !d.is_empty())
}

/// Keep one detector per channel label, asking which when several report it.
fn resolve_conflicts(
    chromatograms: Vec<Chromatogram>,
    resolver: &mut MetadataResolver<'_>,
) -> Result<Vec<Chromatogram>, DecodeError> {
    let mut keep = vec![true; chromatograms.len()];
    for (label, indices) in group_indices(chromatograms.iter().map(|c| c.label.clone())) {
        let mut detectors: Vec<String> = Vec::new();
        for &i in &indices {
            if !detectors.contains(&chromatograms[i].detector) {
                detectors.push(chromatograms[i].detector.clone());
            }
        }
        if detectors.len() < 2 {
            continue;
        }
        let chosen = resolver.preferred_detector(&label, &detectors)?;
        info!("Using {} for channel '{}'", chosen, label);
        for &i in &indices {
            keep[i] = chromatograms[i].detector == chosen;
        }
    }
    Ok(chromatograms
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_name() {
        assert_eq!(sample_name("TrpGFP", ""), "TrpGFP");
        assert_eq!(sample_name("TrpGFP", "TrpGFP"), "TrpGFP");
        assert_eq!(sample_name("TrpGFP", "3"), "TrpGFP_3");
    }

    #[test]
    fn test_windows_stem() {
        assert_eq!(windows_stem(r"C:\LabSolutions\Data\Plate3.lcb"), "Plate3");
        assert_eq!(windows_stem("/data/S200_Inc.lcm"), "S200_Inc");
        assert_eq!(windows_stem("noext"), "noext");
    }

    #[test]
    fn test_section_detector() {
        assert_eq!(section_detector("LC Chromatogram(Detector A-Ch1)"), Some("Detector A"));
        assert_eq!(section_detector("LC Chromatogram(Detector B)"), Some("Detector B"));
        assert_eq!(section_detector("LC Chromatogram"), None);
    }

    #[test]
    fn test_section_channel() {
        assert_eq!(section_channel("LC Chromatogram(Detector A-Ch2)"), Some(2));
        assert_eq!(section_channel("LC Chromatogram(Detector B)"), None);
        assert_eq!(section_channel("LC Chromatogram"), None);
    }

    fn block(channel: &str, extra: &str, data: &str) -> String {
        format!(
            "[LC Chromatogram(Detector A-{})]\nInterval(msec)\t500\n{}R.Time (min)\tIntensity\n{}",
            channel, extra, data
        )
    }

    #[test]
    fn test_one_detector_several_channels() {
        let text = [
            "[Configuration]\nDetector ID\tDetector A\nDetector Name\tSPD-20A\n".to_string(),
            block("Ch1", "Wavelength(nm)\t280\n", "0.0\t1.0\n0.5\t2.0\n"),
            block("Ch2", "Wavelength(nm)\t260\n", "0.0\t3.0\n0.5\t4.0\n"),
        ]
        .join("");
        let sections = split_sections(&text);
        let chroms = chromatograms(Path::new("x.txt"), &sections).unwrap();
        let labels: Vec<&str> = chroms.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["SPD-20A 280nm", "SPD-20A 260nm"]);
        assert!(chroms.iter().all(|c| c.detector == "Detector A"));
    }

    #[test]
    fn test_channel_suffix_without_wavelength() {
        let text = [
            "[Configuration]\nDetector ID\tDetector A\nDetector Name\tSPD-20A\n".to_string(),
            block("Ch1", "", "0.0\t1.0\n"),
            block("Ch2", "", "0.0\t3.0\n"),
        ]
        .join("");
        let sections = split_sections(&text);
        let chroms = chromatograms(Path::new("x.txt"), &sections).unwrap();
        let labels: Vec<&str> = chroms.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["SPD-20A Ch1", "SPD-20A Ch2"]);
    }

    #[test]
    fn test_single_channel_keeps_detector_name() {
        let text = [
            "[Configuration]\nDetector ID\tDetector A\nDetector Name\tSPD-20A\n".to_string(),
            block("Ch1", "Wavelength(nm)\t280\n", "0.0\t1.0\n"),
        ]
        .join("");
        let chroms = chromatograms(Path::new("x.txt"), &split_sections(&text)).unwrap();
        assert_eq!(chroms[0].label, "SPD-20A");
    }

    #[test]
    fn test_split_sections() {
        let text = "[Header]\nApplication Name\tLabSolutions\n[Sample Information]\nSample Name\tA\nSample ID\t\n";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].name, "Sample Information");
        assert_eq!(sections[1].value("Sample Name"), Some("A"));
        assert_eq!(sections[1].value("Sample ID"), None);
    }
}
