use super::*;
use crate::codec::{DocumentVersion, CURRENT_VERSION};
use crate::experiment::Experiment;
use crate::metadata::{NonInteractive, ScriptedSource};
use crate::trace::{melt_fplc, melt_hplc, FplcPoint, Normalization, Normalizer, TracePoint, TraceTable};
use tempfile::tempdir;

fn hplc(sample: &str, signals: &[f64]) -> TraceTable {
    let points = signals
        .iter()
        .enumerate()
        .map(|(i, &signal)| TracePoint {
            time: i as f64,
            volume: i as f64 * 0.5,
            channel: "A280".to_string(),
            sample: sample.to_string(),
            signal,
        })
        .collect();
    TraceTable::Hplc(melt_hplc(points, &Normalizer::default()))
}

fn fplc(sample: &str, scale: f64) -> TraceTable {
    let points = (0..4)
        .map(|i| FplcPoint {
            volume: i as f64,
            column_volume: i as f64 / 8.0,
            channel: "mAU".to_string(),
            fraction: 1 + i as u32,
            sample: sample.to_string(),
            signal: i as f64 * scale,
        })
        .collect();
    TraceTable::Fplc(melt_fplc(points, &Normalizer::default()))
}

fn experiment(id: &str, hplc_table: Option<TraceTable>, fplc_table: Option<TraceTable>) -> Experiment {
    let mut experiment = Experiment::new(id);
    for table in hplc_table.into_iter().chain(fplc_table) {
        experiment.append(table).unwrap();
    }
    experiment
}

fn signals(experiment: &Experiment) -> Vec<f64> {
    experiment
        .hplc()
        .unwrap()
        .iter()
        .filter(|r| r.normalization == Normalization::Signal)
        .map(|r| r.value)
        .collect()
}

#[test]
fn test_memory_store_conflict() {
    let mut store = MemoryStore::new();
    let document = crate::codec::encode(&experiment("exp", Some(hplc("A", &[1.0, 2.0])), None)).unwrap();

    store.save(&document, false).unwrap();
    assert!(matches!(store.save(&document, false), Err(StoreError::Conflict(id)) if id == "exp"));
    store.save(&document, true).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.list_ids().unwrap(), vec!["exp".to_string()]);

    assert!(store.remove("exp").unwrap());
    assert!(!store.remove("exp").unwrap());
    assert!(store.get("exp").unwrap().is_none());
}

#[test]
fn test_directory_store_round_trip() {
    let dir = tempdir().unwrap();
    let mut store = DirectoryStore::open(dir.path().join("docs")).unwrap();
    let original = experiment("Plate3", Some(hplc("SEC_08", &[0.0, 3.0, 1.0])), Some(fplc("prep", 2.0)));
    let document = crate::codec::encode(&original).unwrap();

    store.save(&document, false).unwrap();
    assert!(store.root().join("Plate3.json").is_file());
    std::fs::write(store.root().join("notes.txt"), "ignored").unwrap();
    assert_eq!(store.list_ids().unwrap(), vec!["Plate3".to_string()]);

    let loaded = store.get("Plate3").unwrap().unwrap();
    let decoded = loaded.decode().unwrap();
    assert_eq!(signals(&decoded), signals(&original));
    assert_eq!(decoded.fplc(), original.fplc());

    assert!(matches!(store.save(&document, false), Err(StoreError::Conflict(_))));
    assert!(store.get("missing").unwrap().is_none());
    assert!(store.remove("Plate3").unwrap());
    assert!(store.list_ids().unwrap().is_empty());
}

#[test]
fn test_pull_decodes_or_reports_missing() {
    let mut store = MemoryStore::new();
    let original = experiment("Plate3", Some(hplc("SEC_08", &[0.0, 3.0, 1.0])), None);
    store.save(&crate::codec::encode(&original).unwrap(), false).unwrap();

    let pulled = store.pull("Plate3").unwrap();
    assert_eq!(pulled.id(), "Plate3");
    assert_eq!(signals(&pulled), signals(&original));

    assert!(matches!(store.pull("Plate4"), Err(StoreError::NotFound(id)) if id == "Plate4"));
}

#[test]
fn test_invalid_ids_rejected() {
    let dir = tempdir().unwrap();
    let store = DirectoryStore::open(dir.path()).unwrap();
    for id in ["", "..", "a/b", r"a\b"] {
        assert!(matches!(store.get(id), Err(StoreError::InvalidId(_))), "{:?}", id);
    }
}

#[test]
fn test_upload_creates_then_replaces() {
    let mut store = MemoryStore::new();
    let first = experiment("exp", Some(hplc("A", &[1.0, 2.0])), None);
    let second = experiment("exp", Some(hplc("A", &[5.0, 6.0])), None);

    assert_eq!(upload(&mut store, &first, false, &mut NonInteractive).unwrap(), UploadOutcome::Created);
    assert_eq!(upload(&mut store, &second, true, &mut NonInteractive).unwrap(), UploadOutcome::Replaced);

    let stored = store.get("exp").unwrap().unwrap().decode().unwrap();
    assert_eq!(signals(&stored), vec![5.0, 6.0]);
}

#[test]
fn test_upload_merges_missing_slot_without_asking() {
    let mut store = MemoryStore::new();
    upload(&mut store, &experiment("exp", Some(hplc("A", &[1.0, 2.0])), None), false, &mut NonInteractive).unwrap();

    let mut source = ScriptedSource::empty();
    let outcome = upload(&mut store, &experiment("exp", None, Some(fplc("prep", 1.0))), false, &mut source).unwrap();
    assert_eq!(outcome, UploadOutcome::Merged);
    assert!(source.asked().is_empty());

    let stored = store.get("exp").unwrap().unwrap().decode().unwrap();
    assert_eq!(signals(&stored), vec![1.0, 2.0]);
    assert!(stored.fplc().is_some());
}

#[test]
fn test_upload_asks_for_shared_slots() {
    let mut store = MemoryStore::new();
    let old = experiment("exp", Some(hplc("A", &[1.0, 2.0])), Some(fplc("prep", 1.0)));
    upload(&mut store, &old, false, &mut NonInteractive).unwrap();

    let new = experiment("exp", Some(hplc("A", &[7.0, 8.0])), Some(fplc("prep", 3.0)));
    let mut source = ScriptedSource::new(["n", "y"]);
    let outcome = upload(&mut store, &new, false, &mut source).unwrap();
    assert_eq!(outcome, UploadOutcome::Merged);
    assert_eq!(source.asked().len(), 2);
    assert!(source.asked()[0].contains("HPLC"));

    let stored = store.get("exp").unwrap().unwrap().decode().unwrap();
    assert_eq!(signals(&stored), vec![1.0, 2.0]);
    assert_eq!(stored.fplc(), new.fplc());
}

#[test]
fn test_upload_declined_everywhere_is_unchanged() {
    let mut store = MemoryStore::new();
    let old = experiment("exp", Some(hplc("A", &[1.0, 2.0])), None);
    upload(&mut store, &old, false, &mut NonInteractive).unwrap();

    let new = experiment("exp", Some(hplc("A", &[3.0, 4.0])), None);
    let outcome = upload(&mut store, &new, false, &mut NonInteractive).unwrap();
    assert_eq!(outcome, UploadOutcome::Unchanged);
}

#[test]
fn test_migrate() {
    let mut store = MemoryStore::new();
    let legacy = experiment("old", Some(hplc("A", &[1.0, 2.0])), None);
    store.save(&ExperimentDocument::encode_legacy(&legacy).unwrap(), false).unwrap();
    let current = experiment("new", None, Some(fplc("prep", 1.0)));
    store.save(&crate::codec::encode(&current).unwrap(), false).unwrap();
    let mut ancient = crate::codec::encode(&current).unwrap();
    ancient.id = "ancient".to_string();
    ancient.version = Some(2);
    store.save(&ancient, false).unwrap();

    let report = migrate(&mut store).unwrap();
    assert_eq!(report.migrated, vec!["old".to_string()]);
    assert_eq!(report.current, vec!["new".to_string()]);
    assert_eq!(report.stale, vec![("ancient".to_string(), Some(2))]);

    let migrated = store.get("old").unwrap().unwrap();
    assert_eq!(migrated.version, Some(CURRENT_VERSION));
    assert_eq!(migrated.layout(), DocumentVersion::Current);
    assert_eq!(signals(&migrated.decode().unwrap()), vec![1.0, 2.0]);
    assert_eq!(store.get("ancient").unwrap().unwrap().version, Some(2));
}
