use crate::metadata::MetadataError;

/// Errors that can occur while decoding an instrument export
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// I/O error reading the export
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes are not text in any supported encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Delimited-text parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The export does not have the layout its format requires
    #[error("Malformed export: {0}")]
    Malformed(String),

    /// The export parsed but holds no data rows
    #[error("No data rows in {0}")]
    Empty(String),

    /// Required run metadata could not be resolved
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl DecodeError {
    /// Whether the pipeline may skip the offending file and carry on.
    ///
    /// Unreadable, malformed and empty files are skipped. Metadata failures
    /// (closed input, refused prompt, unwritable settings) end the run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DecodeError::Metadata(_))
    }

    pub(crate) fn malformed(path: &std::path::Path, what: impl std::fmt::Display) -> Self {
        DecodeError::Malformed(format!("{}: {}", path.display(), what))
    }
}
