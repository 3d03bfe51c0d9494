use std::collections::BTreeMap;

use log::{error, info, warn};

use crate::decoders::Decoder;

use super::{FlowRateMatch, MetadataError, MetadataSource, ResolutionOverride, UserSettings};

/// Values supplied by the caller for the whole run. These always win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplicitMetadata {
    /// HPLC flow rate in mL/min
    pub flow_rate: Option<f64>,
    /// FPLC column volume in mL
    pub column_volume: Option<f64>,
    /// Channel label for Agilent exports
    pub channel_name: Option<String>,
    /// Detector that wins channel-label conflicts in Shimadzu exports
    pub preferred_detector: Option<String>,
    /// Rename map applied to Shimadzu legacy channel letters (`A` -> `Trp`)
    pub channel_mapping: BTreeMap<String, String>,
}

/// Resolves missing metadata for one decoder invocation.
///
/// Priority for every value: caller-supplied, then anything the file itself
/// encodes, then the decoder's session override, then the persisted settings,
/// then the metadata source. After a prompt the resolver offers to remember the
/// answer for the run and, where a registry exists, to persist it.
pub struct MetadataResolver<'a> {
    decoder: Decoder,
    explicit: &'a ExplicitMetadata,
    settings: &'a mut UserSettings,
    session: &'a mut ResolutionOverride,
    source: &'a mut dyn MetadataSource,
}

impl<'a> MetadataResolver<'a> {
    /// Create a resolver for one file of `decoder`.
    pub fn new(
        decoder: Decoder,
        explicit: &'a ExplicitMetadata,
        settings: &'a mut UserSettings,
        session: &'a mut ResolutionOverride,
        source: &'a mut dyn MetadataSource,
    ) -> Self {
        Self {
            decoder,
            explicit,
            settings,
            session,
            source,
        }
    }

    /// Decoder this resolver serves.
    pub fn decoder(&self) -> Decoder {
        self.decoder
    }

    /// Caller-supplied values.
    pub fn explicit(&self) -> &'a ExplicitMetadata {
        self.explicit
    }

    /// Resolve a flow rate in mL/min.
    ///
    /// `method` is matched against the settings registry; `file_hint` is a
    /// value encoded in the file itself (Agilent file names).
    pub fn flow_rate(
        &mut self,
        method: Option<&str>,
        file_hint: Option<f64>,
        subject: &str,
    ) -> Result<f64, MetadataError> {
        if let Some(flow_rate) = self.explicit.flow_rate {
            return Ok(flow_rate);
        }
        if let Some(flow_rate) = file_hint {
            return Ok(flow_rate);
        }
        if let Some(flow_rate) = self.session.flow_rate {
            return Ok(flow_rate);
        }
        if let Some(method) = method {
            match self.settings.check_flow_rate(method) {
                FlowRateMatch::Unique { key, flow_rate } => {
                    info!("Using registered flow rate {} mL/min ('{}') for {}", flow_rate, key, subject);
                    return Ok(flow_rate);
                }
                FlowRateMatch::Ambiguous(keys) => {
                    error!(
                        "Method '{}' matches several registered flow rates ({}); asking instead",
                        method,
                        keys.join(", ")
                    );
                }
                FlowRateMatch::NoMatch => {}
            }
        }

        let flow_rate = prompt_positive(self.source, "flow rate", |s| s.ask_flow_rate(subject))?;

        if self.source.confirm(&format!(
            "Use {} mL/min for the remaining {} files?",
            flow_rate, self.decoder
        ))? {
            self.session.flow_rate = Some(flow_rate);
        }
        if let Some(method) = method {
            if self.source.confirm(&format!(
                "Save {} mL/min as the flow rate for method '{}'?",
                flow_rate, method
            ))? {
                self.settings.set_flow_rate(method, flow_rate)?;
                self.settings.save()?;
            }
        }
        Ok(flow_rate)
    }

    /// Resolve a channel label.
    pub fn channel_name(&mut self, file_hint: Option<&str>, subject: &str) -> Result<String, MetadataError> {
        if let Some(channel) = &self.explicit.channel_name {
            return Ok(channel.clone());
        }
        if let Some(channel) = file_hint {
            return Ok(channel.to_string());
        }
        if let Some(channel) = &self.session.channel_name {
            return Ok(channel.clone());
        }

        let channel = loop {
            let answer = self.source.ask_channel(subject)?;
            if !answer.trim().is_empty() {
                break answer.trim().to_string();
            }
            warn!("Channel name must not be empty");
        };

        if self.source.confirm(&format!(
            "Set channel to '{}' for the remaining {} files?",
            channel, self.decoder
        ))? {
            self.session.channel_name = Some(channel.clone());
        }
        Ok(channel)
    }

    /// Pick the detector that provides `channel` when several do.
    ///
    /// A prompted choice is remembered for the rest of the run.
    pub fn preferred_detector(&mut self, channel: &str, candidates: &[String]) -> Result<String, MetadataError> {
        let known = |d: &Option<String>| d.as_ref().filter(|d| candidates.contains(*d)).cloned();
        if let Some(detector) = known(&self.explicit.preferred_detector) {
            return Ok(detector);
        }
        if let Some(detector) = known(&self.session.preferred_detector) {
            return Ok(detector);
        }

        let detector = loop {
            let answer = self.source.ask_detector(channel, candidates)?;
            let answer = answer.trim();
            if let Ok(n) = answer.parse::<usize>() {
                if (1..=candidates.len()).contains(&n) {
                    break candidates[n - 1].clone();
                }
            }
            if let Some(d) = candidates.iter().find(|d| d.as_str() == answer) {
                break d.clone();
            }
            warn!("Choose a detector between 1 and {}", candidates.len());
        };

        if self.session.preferred_detector.is_none() {
            info!("Preferring {} for the remaining {} files", detector, self.decoder);
            self.session.preferred_detector = Some(detector.clone());
        }
        Ok(detector)
    }

    /// Resolve an FPLC column volume in mL.
    pub fn column_volume(&mut self, subject: &str) -> Result<f64, MetadataError> {
        if let Some(cv) = self.explicit.column_volume {
            return Ok(cv);
        }
        if let Some(cv) = self.session.column_volume {
            return Ok(cv);
        }
        if let Some(cv) = self.settings.default_column_volume() {
            return Ok(cv);
        }

        let cv = prompt_positive(self.source, "column volume", |s| s.ask_column_volume(subject))?;

        if self.source.confirm(&format!("Set remaining FPLC column volumes to {} mL?", cv))? {
            self.session.column_volume = Some(cv);
        }
        if self.source.confirm(&format!("Save {} mL as your default FPLC column volume?", cv))? {
            self.settings.set_default_column_volume(Some(cv))?;
            self.settings.save()?;
        }
        Ok(cv)
    }
}

/// Ask until the answer parses as a finite positive number. No retry cap.
fn prompt_positive<F>(source: &mut dyn MetadataSource, what: &str, mut ask: F) -> Result<f64, MetadataError>
where
    F: FnMut(&mut dyn MetadataSource) -> Result<String, MetadataError>,
{
    loop {
        let answer = ask(source)?;
        match answer.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => return Ok(value),
            _ => warn!("{} must be a positive number, got '{}'", what, answer.trim()),
        }
    }
}
