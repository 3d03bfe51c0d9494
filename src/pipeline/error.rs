use std::path::PathBuf;

use crate::decoders::DecodeError;
use crate::experiment::ExperimentError;
use crate::metadata::MetadataError;

/// Errors that stop a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// I/O error while listing input directories
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A file failed in a way that must not be skipped
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        /// File being decoded
        path: PathBuf,
        /// Underlying failure
        source: DecodeError,
    },

    /// Experiment id could not be resolved
    #[error("Metadata error: {0}")]
    MetadataError(#[from] MetadataError),

    /// A decoded table was rejected by the experiment
    #[error("Experiment error: {0}")]
    ExperimentError(#[from] ExperimentError),

    /// No input produced any rows
    #[error("No input file could be decoded")]
    NothingDecoded,
}
