use std::collections::HashMap;

use crate::decoders::Decoder;

/// Answers remembered for the rest of one run, for one decoder variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionOverride {
    /// Flow rate in mL/min
    pub flow_rate: Option<f64>,
    /// Channel label (Agilent)
    pub channel_name: Option<String>,
    /// Detector that wins channel-label conflicts (Shimadzu modern)
    pub preferred_detector: Option<String>,
    /// Column volume in mL (AKTA)
    pub column_volume: Option<f64>,
}

impl ResolutionOverride {
    /// Whether nothing has been remembered yet.
    pub fn is_empty(&self) -> bool {
        self.flow_rate.is_none()
            && self.channel_name.is_none()
            && self.preferred_detector.is_none()
            && self.column_volume.is_none()
    }
}

/// Session-scoped overrides for every decoder variant.
///
/// Lives for one pipeline invocation. Nothing here is shared between runs.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    by_decoder: HashMap<Decoder, ResolutionOverride>,
}

impl SessionOverrides {
    /// Empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides recorded for `decoder`, if any.
    pub fn get(&self, decoder: Decoder) -> Option<&ResolutionOverride> {
        self.by_decoder.get(&decoder)
    }

    /// Mutable overrides for `decoder`, created empty on first use.
    pub fn for_decoder(&mut self, decoder: Decoder) -> &mut ResolutionOverride {
        self.by_decoder.entry(decoder).or_default()
    }

    /// Forget everything remembered for `decoder`.
    pub fn clear(&mut self, decoder: Decoder) {
        self.by_decoder.remove(&decoder);
    }

    /// Forget everything.
    pub fn clear_all(&mut self) {
        self.by_decoder.clear();
    }
}
