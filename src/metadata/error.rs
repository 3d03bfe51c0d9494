/// Errors that can occur while resolving run metadata
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// I/O error reading or writing the settings file
    #[error("Failed to access settings file: {0}")]
    IoError(#[from] std::io::Error),

    /// Atomic replacement of the settings file failed
    #[error("Failed to persist settings file: {0}")]
    PersistError(#[from] tempfile::PersistError),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The metadata source ran out of answers (closed stdin, exhausted script)
    #[error("No answer available for: {0}")]
    InputExhausted(String),

    /// The metadata source refuses to prompt and no other tier had a value
    #[error("Could not resolve {0} without prompting")]
    Unresolved(String),

    /// Tried to delete a flow rate that is not registered
    #[error("No flow rate registered for method '{0}'")]
    UnknownFlowRate(String),

    /// A value rejected by a settings mutation
    #[error("Invalid setting: {0}")]
    InvalidValue(String),

    /// No home directory to place the settings file in
    #[error("Could not determine home directory for the settings file")]
    NoHomeDirectory,
}
