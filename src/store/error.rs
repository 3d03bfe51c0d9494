use crate::codec::CodecError;
use crate::metadata::MetadataError;

/// Errors that can occur while reading or writing the document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error on a store directory or document file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Atomic rename of a written document failed
    #[error("Failed to persist document: {0}")]
    PersistError(#[from] tempfile::PersistError),

    /// Document could not be encoded or decoded
    #[error("Codec error: {0}")]
    CodecError(#[from] CodecError),

    /// Merge confirmation could not be obtained
    #[error("Metadata error: {0}")]
    MetadataError(#[from] MetadataError),

    /// A document with this id already exists and overwrite was not requested
    #[error("Document '{0}' already exists")]
    Conflict(String),

    /// No document with this id
    #[error("Document '{0}' not found")]
    NotFound(String),

    /// Id cannot name a document
    #[error("Invalid document id '{0}'")]
    InvalidId(String),
}
