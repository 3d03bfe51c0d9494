//! Upload with slot-wise merge, and in-place migration.

use log::{info, warn};

use super::{DocumentStore, StoreError};
use crate::codec::{DocumentVersion, ExperimentDocument, CURRENT_VERSION};
use crate::experiment::Experiment;
use crate::metadata::MetadataSource;

/// What [`upload`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No document existed under the id
    Created,
    /// The stored document was replaced wholesale
    Replaced,
    /// At least one slot of the stored document was filled or replaced
    Merged,
    /// Every slot was kept as stored
    Unchanged,
}

/// Result of a [`migrate`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Ids re-saved at the current version
    pub migrated: Vec<String>,
    /// Ids already at the current version
    pub current: Vec<String>,
    /// Ids too old to decode, left untouched
    pub stale: Vec<(String, Option<u32>)>,
}

/// Save `experiment` to `store`.
///
/// When the id is already taken, `overwrite` replaces the stored document.
/// Otherwise the two are merged slot by slot: a slot only one side holds is
/// taken from that side, and for a slot both sides hold `source` is asked
/// whether the new data should replace the stored data.
pub fn upload<S: DocumentStore + ?Sized>(
    store: &mut S,
    experiment: &Experiment,
    overwrite: bool,
    source: &mut dyn MetadataSource,
) -> Result<UploadOutcome, StoreError> {
    info!("Uploading {}", experiment);
    let document = ExperimentDocument::encode(experiment)?;

    let Some(stored) = store.get(experiment.id())? else {
        store.save(&document, false)?;
        return Ok(UploadOutcome::Created);
    };
    if overwrite {
        store.save(&document, true)?;
        return Ok(UploadOutcome::Replaced);
    }

    warn!("Experiment \"{}\" already in store", experiment.id());
    let mut merged = stored.decode()?;
    merged.version = CURRENT_VERSION;
    let mut changed = stored.layout() != DocumentVersion::Current;

    if let Some(rows) = experiment.hplc() {
        if merged.hplc().is_none() || source.confirm("Overwrite old HPLC data?")? {
            merged.set_hplc(Some(rows.to_vec()));
            changed = true;
        }
    }
    if let Some(rows) = experiment.fplc() {
        if merged.fplc().is_none() || source.confirm("Overwrite old FPLC data?")? {
            merged.set_fplc(Some(rows.to_vec()));
            changed = true;
        }
    }

    if !changed {
        return Ok(UploadOutcome::Unchanged);
    }
    store.save(&ExperimentDocument::encode(&merged)?, true)?;
    Ok(UploadOutcome::Merged)
}

/// Re-save every decodable document at [`CURRENT_VERSION`].
///
/// Documents older than the one-back layout are reported in
/// [`MigrationReport::stale`] and not modified.
pub fn migrate<S: DocumentStore + ?Sized>(store: &mut S) -> Result<MigrationReport, StoreError> {
    let mut report = MigrationReport::default();
    for id in store.list_ids()? {
        let Some(document) = store.get(&id)? else {
            continue;
        };
        match document.layout() {
            DocumentVersion::Current => report.current.push(id),
            DocumentVersion::Stale(version) => {
                warn!("Skipping '{}': version {:?} cannot be decoded", id, version);
                report.stale.push((id, version));
            }
            DocumentVersion::Legacy => {
                let mut experiment = document.decode()?;
                experiment.version = CURRENT_VERSION;
                let migrated = ExperimentDocument::encode(&experiment)?;
                store.save(&migrated, true)?;
                info!("Migrated '{}' to version {}", id, CURRENT_VERSION);
                report.migrated.push(id);
            }
        }
    }
    Ok(report)
}
