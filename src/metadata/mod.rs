//! # Run Metadata Resolution
//!
//! Instrument exports routinely omit what is needed to turn a time axis into a
//! volume axis (flow rate), what a trace measured (channel label), or which of
//! two detectors to trust. This module supplies those values.
//!
//! ## Resolution tiers
//!
//! 1. Values passed explicitly by the caller ([`ExplicitMetadata`])
//! 2. Values encoded in the file itself (Agilent file-name tokens)
//! 3. The decoder's [`ResolutionOverride`] from an earlier file in this run
//! 4. Persisted [`UserSettings`] (flow-rate registry, default column volume)
//! 5. A [`MetadataSource`] prompt, retried until the answer is valid
//!
//! Prompted answers may be remembered for the run and, with consent, written
//! back to the settings file. Nothing is written without an explicit
//! [`UserSettings::save`].

mod error;
mod overrides;
mod resolver;
mod settings;
mod source;

#[cfg(test)]
mod tests;

pub use error::MetadataError;
pub use overrides::{ResolutionOverride, SessionOverrides};
pub use resolver::{ExplicitMetadata, MetadataResolver};
pub use settings::{FlowRateMatch, UserSettings, SETTINGS_FILE_NAME};
pub use source::{MetadataSource, NonInteractive, ScriptedSource, TerminalSource};
