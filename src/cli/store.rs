use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use lctrace::codec::DocumentVersion;
use lctrace::metadata::{MetadataSource, TerminalSource};
use lctrace::store::{migrate, DirectoryStore, DocumentStore};

use super::StoreCommand;

/// Work with the document store at `path`
pub fn run(path: &Path, command: StoreCommand) -> Result<()> {
    let mut store = DirectoryStore::open(path)
        .with_context(|| format!("Failed to open document store {}", path.display()))?;

    match command {
        StoreCommand::List => {
            for id in store.list_ids()? {
                let version = match store.get(&id)?.map(|d| d.layout()) {
                    Some(DocumentVersion::Current) => "current".to_string(),
                    Some(DocumentVersion::Legacy) => "legacy, re-save".to_string(),
                    Some(DocumentVersion::Stale(v)) => format!("stale {:?}", v),
                    None => continue,
                };
                println!("{:<40} {}", id, version);
            }
        }
        StoreCommand::Export { id, output_dir } => {
            let experiment = store
                .pull(&id)
                .with_context(|| format!("Failed to load '{}' from {}", id, path.display()))?;
            let out_dir = output_dir.unwrap_or_else(|| PathBuf::from(experiment.id()));
            experiment
                .save_csvs(&out_dir)
                .with_context(|| format!("Failed to write CSVs to {}", out_dir.display()))?;
            println!("Exported {} to {}", experiment, out_dir.display());
        }
        StoreCommand::Migrate { yes } => {
            if !yes {
                let mut terminal = TerminalSource::stdio();
                let question = format!("Migrate every document in {}? Back it up first.", path.display());
                if !terminal.confirm(&question)? {
                    println!("Migration cancelled");
                    return Ok(());
                }
            }
            let report = migrate(&mut store)?;
            println!(
                "{} migrated, {} already current, {} too old to migrate",
                report.migrated.len(),
                report.current.len(),
                report.stale.len()
            );
            for (id, version) in &report.stale {
                println!("  {} (version {:?})", id, version);
            }
        }
    }

    Ok(())
}
