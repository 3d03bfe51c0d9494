use crate::trace::SchemaViolation;

/// Errors that can occur while encoding or decoding experiment documents
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Document predates the one-version-back compatibility window
    #[error("Document '{id}' has unsupported version {version:?}; run a migration first")]
    StaleFormat {
        /// Document id
        id: String,
        /// Stored version, if any
        version: Option<u32>,
    },

    /// A column the layout requires is absent
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// Payload present but not in the expected shape
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// A sample name collides with a pivot index column
    #[error("Sample name '{0}' collides with an index column")]
    ReservedSampleName(String),

    /// Decoded rows fail the canonical schema
    #[error("Schema violation: {0}")]
    SchemaViolation(#[from] SchemaViolation),
}
