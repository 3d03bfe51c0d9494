//! Agilent ChemStation exports.
//!
//! Headerless UTF-16 `time<TAB>signal` lines. The file itself names neither the
//! channel nor the flow rate, so users encode them in the file name:
//! `NAI_Trp_Channel280_Flow0.5.CSV`.

use std::path::Path;

use log::debug;

use super::text::{file_name, file_stem, first_cell, first_line, has_extension, parse_finite, read_text};
use super::waters::data_pairs;
use super::DecodeError;
use crate::metadata::MetadataResolver;
use crate::trace::{melt_hplc, Normalizer, TracePoint, TraceTable};

const EXTENSIONS: &[&str] = &["csv"];

const CHANNEL_TOKEN: &str = "_Channel";
const FLOW_TOKEN: &str = "_Flow";
const RETENTION_SUFFIX: &str = "_RT";

/// What the file name tells us.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct NameTokens {
    pub sample: String,
    pub channel: Option<String>,
    pub flow_rate: Option<f64>,
}

pub(super) fn claims(path: &Path) -> bool {
    has_extension(path, EXTENSIONS)
        && first_line(path)
            .as_deref()
            .and_then(first_cell)
            .is_some_and(|cell| parse_finite(cell).is_some())
}

pub(super) fn decode(
    path: &Path,
    resolver: &mut MetadataResolver<'_>,
    normalizer: &Normalizer,
) -> Result<(TraceTable, Option<String>), DecodeError> {
    let text = read_text(path)?;
    let samples = data_pairs(path, text.lines())?;
    if samples.is_empty() {
        return Err(DecodeError::Empty(path.display().to_string()));
    }

    let tokens = parse_file_name(&file_stem(path));
    let subject = file_name(path);
    let channel = resolver.channel_name(tokens.channel.as_deref(), &subject)?;
    let flow_rate = resolver.flow_rate(None, tokens.flow_rate, &subject)?;
    debug!(
        "{}: sample '{}', channel '{}', {} mL/min",
        path.display(),
        tokens.sample,
        channel,
        flow_rate
    );

    let points = samples
        .into_iter()
        .map(|(time, signal)| TracePoint {
            time,
            volume: time * flow_rate,
            channel: channel.clone(),
            sample: tokens.sample.clone(),
            signal,
        })
        .collect();

    Ok((TraceTable::Hplc(melt_hplc(points, normalizer)), None))
}

/// Split `_Channel<token>` and `_Flow<number>` out of a file stem.
pub(super) fn parse_file_name(stem: &str) -> NameTokens {
    let mut sample = stem.replace(RETENTION_SUFFIX, "");

    let channel = take_token(&mut sample, CHANNEL_TOKEN, |c| c != '_').filter(|t| !t.is_empty());
    let flow_rate = take_token(&mut sample, FLOW_TOKEN, |c| c.is_ascii_digit() || c == '.').and_then(|t| {
        match t.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Some(v),
            _ => {
                debug!("Ignoring unusable flow rate '{}' in '{}'", t, stem);
                None
            }
        }
    });

    NameTokens {
        sample,
        channel,
        flow_rate,
    }
}

/// Remove `marker` and the run of characters after it accepted by `accept`.
fn take_token(name: &mut String, marker: &str, accept: impl Fn(char) -> bool) -> Option<String> {
    let start = name.find(marker)?;
    let value_start = start + marker.len();
    let value_len = name[value_start..]
        .char_indices()
        .find(|&(_, c)| !accept(c))
        .map(|(i, _)| i)
        .unwrap_or(name.len() - value_start);
    let value = name[value_start..value_start + value_len].to_string();
    name.replace_range(start..value_start + value_len, "");
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_name_with_tokens() {
        let tokens = parse_file_name("NAI_Trp_Channel280_Flow0.5");
        assert_eq!(tokens.sample, "NAI_Trp");
        assert_eq!(tokens.channel.as_deref(), Some("280"));
        assert_eq!(tokens.flow_rate, Some(0.5));
    }

    #[test]
    fn test_parse_file_name_token_order() {
        let tokens = parse_file_name("A1_Flow1.0_ChannelGFP_RT");
        assert_eq!(tokens.sample, "A1");
        assert_eq!(tokens.channel.as_deref(), Some("GFP"));
        assert_eq!(tokens.flow_rate, Some(1.0));
    }

    #[test]
    fn test_parse_file_name_without_tokens() {
        let tokens = parse_file_name("plain_sample");
        assert_eq!(tokens.sample, "plain_sample");
        assert_eq!(tokens.channel, None);
        assert_eq!(tokens.flow_rate, None);
    }

    #[test]
    fn test_bad_flow_token_is_stripped_and_ignored() {
        let tokens = parse_file_name("S_Flow.");
        assert_eq!(tokens.sample, "S");
        assert_eq!(tokens.flow_rate, None);
    }
}
