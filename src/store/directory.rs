//! Filesystem-backed store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use super::{check_id, DocumentStore, StoreError};
use crate::codec::ExperimentDocument;

const EXTENSION: &str = "json";

/// One pretty-printed `<id>.json` file per document.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", id, EXTENSION))
    }
}

impl DocumentStore for DirectoryStore {
    fn get(&self, id: &str) -> Result<Option<ExperimentDocument>, StoreError> {
        check_id(id)?;
        let path = self.document_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(ExperimentDocument::from_json(&json)?))
    }

    fn save(&mut self, document: &ExperimentDocument, overwrite: bool) -> Result<(), StoreError> {
        check_id(&document.id)?;
        let path = self.document_path(&document.id);
        if !overwrite && path.exists() {
            return Err(StoreError::Conflict(document.id.clone()));
        }

        let json = document.to_json()?;
        let mut file = NamedTempFile::new_in(&self.root)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        check_id(id)?;
        let path = self.document_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }
}
