//! Integration tests for lctrace
//!
//! These tests drive the full path from instrument exports on disk through
//! the document store and back.

use lctrace::codec::DocumentVersion;
use lctrace::prelude::*;
use lctrace::store::{migrate, upload, UploadOutcome};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const WATERS: &str = "\"SampleName\"\t\"Channel\"\t\"Instrument Method Name\"\t\"Sample Set Name\"\n\
\"SEC_08\"\t\"2475ChA ex280/em350\"\t\"Sup6Inc_10_300\"\t\"Plate3\"\n\
0.0\t0.0\n1.0\t2.0\n2.0\t6.0\n3.0\t4.0\n4.0\t1.0\n";

const AKTA: &str = "Chrom.1\t\tChrom.1\t
UV 1_280\t\tFractions\t
ml\tmAU\tml\tFraction
0.0\t0.0\t0.0\tA1
1.0\t3.0\t1.5\tA2
2.0\t9.0\t\t
3.0\t1.0\t\t
";

fn write_utf16(path: &Path, text: &str) {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    fs::write(path, bytes).unwrap();
}

/// Lay out one Waters and one AKTA export in `dir`.
fn exports(dir: &Path) -> Vec<PathBuf> {
    let waters = dir.join("SEC_08.arw");
    fs::write(&waters, WATERS).unwrap();
    let akta = dir.join("prep.csv");
    write_utf16(&akta, AKTA);
    vec![waters, akta]
}

fn options() -> PipelineOptions {
    PipelineOptions {
        explicit: ExplicitMetadata {
            flow_rate: Some(0.5),
            column_volume: Some(24.0),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn process(inputs: &[PathBuf]) -> Experiment {
    let mut settings = UserSettings::in_memory();
    let mut source = NonInteractive;
    Pipeline::new(options(), &mut settings, &mut source)
        .run(inputs)
        .unwrap()
        .experiment
}

/// Decode, export CSVs, store and reload one experiment
#[test]
fn test_process_store_reload() {
    let dir = tempdir().unwrap();
    let inputs = exports(dir.path());

    let experiment = process(&inputs);
    assert_eq!(experiment.id(), "Plate3");

    let out_dir = dir.path().join("out");
    let csvs = experiment.save_csvs(&out_dir).unwrap();
    for path in [&csvs.hplc_long, &csvs.hplc_wide, &csvs.fplc] {
        let path = path.as_ref().expect("every slot was filled");
        assert!(path.exists());
    }
    let long = fs::read_to_string(csvs.hplc_long.unwrap()).unwrap();
    // header plus a Signal and a Normalized row per timepoint
    assert_eq!(long.lines().count(), 1 + 2 * 5);

    let mut store = DirectoryStore::open(dir.path().join("store")).unwrap();
    let mut source = NonInteractive;
    let outcome = upload(&mut store, &experiment, false, &mut source).unwrap();
    assert_eq!(outcome, UploadOutcome::Created);
    assert_eq!(store.list_ids().unwrap(), vec!["Plate3".to_string()]);

    let document = store.get("Plate3").unwrap().unwrap();
    assert_eq!(document.layout(), DocumentVersion::Current);
    let reloaded = document.decode().unwrap();
    assert_eq!(reloaded.id(), experiment.id());
    assert_eq!(reloaded.hplc().unwrap().len(), experiment.hplc().unwrap().len());
    assert_eq!(reloaded.fplc().unwrap().len(), experiment.fplc().unwrap().len());
}

/// The stored preview is reduced while the CSVs keep every point
#[test]
fn test_reduced_preview_is_stored() {
    let dir = tempdir().unwrap();
    let experiment = process(&exports(dir.path()));

    let preview = experiment.preview(3).unwrap();
    assert_eq!(experiment.hplc().unwrap().len(), 10);
    assert_eq!(preview.hplc().unwrap().len(), 6);

    let mut store = MemoryStore::new();
    let mut source = NonInteractive;
    upload(&mut store, &preview, false, &mut source).unwrap();
    let stored = store.get("Plate3").unwrap().unwrap().decode().unwrap();
    assert_eq!(stored.hplc().unwrap().len(), 6);
}

/// A second run of the same plate asks before touching stored slots
#[test]
fn test_second_upload_prompts_per_slot() {
    let dir = tempdir().unwrap();
    let experiment = process(&exports(dir.path()));
    let mut store = DirectoryStore::open(dir.path().join("store")).unwrap();
    upload(&mut store, &experiment, false, &mut NonInteractive).unwrap();

    let mut source = ScriptedSource::new(["n", "n"]);
    let outcome = upload(&mut store, &experiment, false, &mut source).unwrap();
    assert_eq!(outcome, UploadOutcome::Unchanged);
    assert_eq!(source.asked().len(), 2);

    // non-interactive sources decline, so nothing is replaced either
    let outcome = upload(&mut store, &experiment, false, &mut NonInteractive).unwrap();
    assert_eq!(outcome, UploadOutcome::Unchanged);

    let outcome = upload(&mut store, &experiment, true, &mut NonInteractive).unwrap();
    assert_eq!(outcome, UploadOutcome::Replaced);
}

/// Legacy documents written by older releases are upgraded in place
#[test]
fn test_migrate_legacy_store() {
    let dir = tempdir().unwrap();
    let experiment = process(&exports(dir.path()));
    let mut store = DirectoryStore::open(dir.path().join("store")).unwrap();

    let legacy = ExperimentDocument::encode_legacy(&experiment).unwrap();
    assert_eq!(legacy.layout(), DocumentVersion::Legacy);
    store.save(&legacy, false).unwrap();

    let report = migrate(&mut store).unwrap();
    assert_eq!(report.migrated, vec!["Plate3".to_string()]);
    assert!(report.stale.is_empty());

    let document = store.get("Plate3").unwrap().unwrap();
    assert_eq!(document.layout(), DocumentVersion::Current);
    assert_eq!(document.version, Some(CURRENT_VERSION));
    let reloaded = document.decode().unwrap();
    assert_eq!(reloaded.fplc().unwrap().len(), experiment.fplc().unwrap().len());
}
