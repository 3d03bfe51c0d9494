//! # Processing Pipeline
//!
//! One run turns a list of export files (or directories of them) into a single
//! [`Experiment`]:
//!
//! 1. Directories are expanded to their files, sorted by name
//! 2. Each file is dispatched to the decoder that claims it
//! 3. Files are decoded strictly one at a time, in dispatch order
//! 4. Decoded tables are appended to the experiment
//! 5. Every table present is renormalized over the combined data
//!
//! Decoding order matters: answers given while decoding one file (flow rate,
//! channel, preferred detector) become session overrides that later files of
//! the same decoder reuse. The overrides live for one [`Pipeline::run`] call.
//!
//! A per-file failure that is
//! [`recoverable`](crate::decoders::DecodeError::is_recoverable) is logged and
//! the file skipped; anything else ends the run. Cancellation is checked
//! between files, never mid-file.

mod error;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::decoders::{dispatch, Decoder};
use crate::experiment::Experiment;
use crate::metadata::{ExplicitMetadata, MetadataResolver, MetadataSource, SessionOverrides, UserSettings};
use crate::trace::{Normalization, Normalizer, TraceRow, TraceTable};

pub use error::PipelineError;

/// Caller-supplied settings for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOptions {
    /// Values that override every other metadata tier
    pub explicit: ExplicitMetadata,
    /// Normalization window and floor mode
    pub normalizer: Normalizer,
    /// Factor applied to HPLC signal before appending
    pub scale_hplc: Option<f64>,
    /// Experiment id; defaults to the first run identity found
    pub experiment_id: Option<String>,
}

/// A file the run did not use.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    /// The file
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Result of [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The assembled experiment
    pub experiment: Experiment,
    /// Files decoded, with their decoder, in processing order
    pub decoded: Vec<(PathBuf, Decoder)>,
    /// Claimed files skipped after a recoverable error
    pub skipped: Vec<SkippedFile>,
    /// Whether cancellation stopped the run early
    pub cancelled: bool,
}

/// Drives one processing run.
pub struct Pipeline<'a> {
    options: PipelineOptions,
    settings: &'a mut UserSettings,
    source: &'a mut dyn MetadataSource,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline. `settings` may be updated (and saved) when the user
    /// agrees to persist a prompted value.
    pub fn new(
        options: PipelineOptions,
        settings: &'a mut UserSettings,
        source: &'a mut dyn MetadataSource,
    ) -> Self {
        Self {
            options,
            settings,
            source,
            cancel: None,
        }
    }

    /// Stop before the next file once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Options this pipeline runs with.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Process `inputs` into one experiment.
    pub fn run<P: AsRef<Path>>(&mut self, inputs: &[P]) -> Result<RunOutcome, PipelineError> {
        let files = expand_inputs(inputs)?;
        let claimed = dispatch(&files);
        info!("{} of {} files claimed by a decoder", claimed.len(), files.len());

        let mut session = SessionOverrides::new();
        let mut tables = Vec::new();
        let mut run_identity = None;
        let mut decoded = Vec::new();
        let mut skipped = Vec::new();
        let mut cancelled = false;

        for (path, decoder) in claimed {
            if self.cancelled() {
                info!("Cancelled before {}", path.display());
                cancelled = true;
                break;
            }

            let result = {
                let mut resolver = MetadataResolver::new(
                    decoder,
                    &self.options.explicit,
                    &mut *self.settings,
                    session.for_decoder(decoder),
                    &mut *self.source,
                );
                decoder.decode(&path, &mut resolver, &self.options.normalizer)
            };

            match result {
                Ok(file) => {
                    debug!("Decoded {} rows from {}", file.table.len(), path.display());
                    let mut table = file.table;
                    if let (Some(factor), TraceTable::Hplc(rows)) = (self.options.scale_hplc, &mut table) {
                        scale_signal(rows, factor);
                    }
                    if run_identity.is_none() {
                        run_identity = file.run_identity;
                    }
                    tables.push(table);
                    decoded.push((path, decoder));
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping {}: {}", path.display(), e);
                    skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
                Err(source) => return Err(PipelineError::Decode { path, source }),
            }
        }

        if tables.is_empty() {
            return Err(PipelineError::NothingDecoded);
        }

        let id = match self.options.experiment_id.clone().or(run_identity) {
            Some(id) => id,
            None => self.ask_experiment_id()?,
        };
        let mut experiment = Experiment::new(&id);
        for table in tables {
            experiment.append(table)?;
        }
        if experiment.hplc().is_some() {
            experiment.renormalize_hplc(&self.options.normalizer)?;
        }
        if experiment.fplc().is_some() {
            experiment.renormalize_fplc(&self.options.normalizer)?;
        }
        info!("Assembled {}", experiment);

        Ok(RunOutcome {
            experiment,
            decoded,
            skipped,
            cancelled,
        })
    }

    fn ask_experiment_id(&mut self) -> Result<String, PipelineError> {
        loop {
            let answer = self.source.ask_experiment_id()?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
            warn!("Experiment name must not be empty");
        }
    }
}

fn scale_signal(rows: &mut [TraceRow], factor: f64) {
    for row in rows.iter_mut().filter(|r| r.normalization == Normalization::Signal) {
        row.value *= factor;
    }
}

/// Replace each directory with the files directly inside it, sorted by name.
/// Other paths pass through unchanged.
pub fn expand_inputs<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let mut entries = Vec::new();
            for entry in fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() {
                    entries.push(path);
                }
            }
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.to_path_buf());
        }
    }
    Ok(files)
}
