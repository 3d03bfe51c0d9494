use crate::trace::SchemaViolation;

/// Errors that can occur while building or projecting an Experiment
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    /// An appended table does not satisfy the canonical schema
    #[error("Schema violation: {0}")]
    SchemaViolation(#[from] SchemaViolation),

    /// The operation needs a trace table the experiment does not hold
    #[error("No {0} data")]
    NoData(&'static str),

    /// An argument outside its domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error writing exports
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}
