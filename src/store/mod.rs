//! # Document Store
//!
//! Experiments are persisted as [`ExperimentDocument`]s keyed by id. The core
//! only needs a handful of operations from a store, captured by
//! [`DocumentStore`]; two implementations ship with the crate:
//!
//! - [`MemoryStore`]: a map, for tests and dry runs
//! - [`DirectoryStore`]: one `<id>.json` per document, each write atomic
//!
//! [`upload`] and [`migrate`] build the higher-level workflows on top.

mod directory;
mod error;
mod workflow;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use crate::codec::ExperimentDocument;
use crate::experiment::Experiment;

pub use directory::DirectoryStore;
pub use error::StoreError;
pub use workflow::{migrate, upload, MigrationReport, UploadOutcome};

/// Minimal document-store interface.
pub trait DocumentStore {
    /// Fetch a document, `None` when the id is unknown.
    fn get(&self, id: &str) -> Result<Option<ExperimentDocument>, StoreError>;

    /// Store a document under its id.
    ///
    /// Fails with [`StoreError::Conflict`] when the id is taken and `overwrite`
    /// is false.
    fn save(&mut self, document: &ExperimentDocument, overwrite: bool) -> Result<(), StoreError>;

    /// All stored ids, sorted.
    fn list_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Delete a document. Returns whether it existed.
    fn remove(&mut self, id: &str) -> Result<bool, StoreError>;

    /// Fetch and decode an experiment.
    ///
    /// Fails with [`StoreError::NotFound`] when the id is unknown.
    fn pull(&self, id: &str) -> Result<Experiment, StoreError> {
        let document = self.get(id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(document.decode()?)
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: BTreeMap<String, ExperimentDocument>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<ExperimentDocument>, StoreError> {
        Ok(self.documents.get(id).cloned())
    }

    fn save(&mut self, document: &ExperimentDocument, overwrite: bool) -> Result<(), StoreError> {
        check_id(&document.id)?;
        if !overwrite && self.documents.contains_key(&document.id) {
            return Err(StoreError::Conflict(document.id.clone()));
        }
        self.documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.documents.keys().cloned().collect())
    }

    fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        Ok(self.documents.remove(id).is_some())
    }
}

pub(crate) fn check_id(id: &str) -> Result<(), StoreError> {
    if id.trim().is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}
