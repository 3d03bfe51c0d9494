use super::*;
use crate::decoders::DecodeError;
use crate::metadata::{NonInteractive, ScriptedSource};
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

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

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn write_utf16(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

fn explicit_options() -> PipelineOptions {
    PipelineOptions {
        explicit: ExplicitMetadata {
            flow_rate: Some(0.5),
            column_volume: Some(24.0),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_mixed_directory_run() {
    let dir = tempdir().unwrap();
    write(&dir, "SEC_08.arw", WATERS);
    write_utf16(&dir, "prep.csv", AKTA);
    write(&dir, "notes.txt", "nothing to see");
    let header: String = WATERS.lines().take(2).collect::<Vec<_>>().join("\n");
    write(&dir, "blank.arw", &header);

    let mut settings = UserSettings::in_memory();
    let mut source = NonInteractive;
    let mut pipeline = Pipeline::new(explicit_options(), &mut settings, &mut source);
    let outcome = pipeline.run(&[dir.path()]).unwrap();

    assert_eq!(outcome.experiment.id(), "Plate3");
    assert!(outcome.experiment.hplc().is_some());
    assert!(outcome.experiment.fplc().is_some());
    assert!(!outcome.cancelled);

    // byte order puts "SEC_08.arw" ahead of the lowercase names
    let decoders: Vec<Decoder> = outcome.decoded.iter().map(|(_, d)| *d).collect();
    assert_eq!(decoders, vec![Decoder::Waters, Decoder::Akta]);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].path.ends_with("blank.arw"));
}

#[test]
fn test_explicit_id_and_scale() {
    let dir = tempdir().unwrap();
    let path = write(&dir, "SEC_08.arw", WATERS);

    let options = PipelineOptions {
        experiment_id: Some("run/7".to_string()),
        scale_hplc: Some(2.0),
        ..explicit_options()
    };
    let mut settings = UserSettings::in_memory();
    let mut source = NonInteractive;
    let outcome = Pipeline::new(options, &mut settings, &mut source).run(&[path]).unwrap();

    assert_eq!(outcome.experiment.id(), "run-7");
    let signal: Vec<f64> = outcome
        .experiment
        .hplc()
        .unwrap()
        .iter()
        .filter(|r| r.normalization == Normalization::Signal)
        .map(|r| r.value)
        .collect();
    assert_eq!(signal, vec![0.0, 4.0, 12.0, 8.0, 2.0]);
}

#[test]
fn test_session_overrides_span_files() {
    let dir = tempdir().unwrap();
    let first = write_utf16(&dir, "NAI.csv", "0.0\t1.0\n1.0\t4.0\n2.0\t2.0\n");
    let second = write_utf16(&dir, "TrpGFP.csv", "0.0\t2.0\n1.0\t8.0\n2.0\t3.0\n");

    // channel, remember; flow, remember; then an id after one blank answer
    let mut source = ScriptedSource::new(["GFP", "y", "1.0", "y", " ", "agilent run"]);
    let mut settings = UserSettings::in_memory();
    let outcome = Pipeline::new(PipelineOptions::default(), &mut settings, &mut source)
        .run(&[first, second])
        .unwrap();

    assert_eq!(outcome.experiment.id(), "agilent run");
    assert_eq!(outcome.decoded.len(), 2);
    let rows = outcome.experiment.hplc().unwrap();
    assert!(rows.iter().all(|r| r.channel == "GFP"));
    assert!(rows.iter().any(|r| r.sample == "TrpGFP" && r.volume == 2.0));
    assert_eq!(source.remaining(), 0);
    assert_eq!(source.asked().len(), 6);
    assert!(settings.flow_rates().is_empty());
}

#[test]
fn test_unresolvable_metadata_is_fatal() {
    let dir = tempdir().unwrap();
    let path = write(&dir, "SEC_08.arw", WATERS);

    let mut settings = UserSettings::in_memory();
    let mut source = NonInteractive;
    let err = Pipeline::new(PipelineOptions::default(), &mut settings, &mut source)
        .run(&[path])
        .unwrap_err();
    match err {
        PipelineError::Decode { path, source } => {
            assert!(path.ends_with("SEC_08.arw"));
            assert!(matches!(source, DecodeError::Metadata(_)));
        }
        other => panic!("expected a decode failure, got {:?}", other),
    }
}

#[test]
fn test_cancel_before_first_file() {
    let dir = tempdir().unwrap();
    let path = write(&dir, "SEC_08.arw", WATERS);
    let flag = AtomicBool::new(true);

    let mut settings = UserSettings::in_memory();
    let mut source = NonInteractive;
    let result = Pipeline::new(explicit_options(), &mut settings, &mut source)
        .with_cancel_flag(&flag)
        .run(&[path]);
    assert!(matches!(result, Err(PipelineError::NothingDecoded)));
}

#[test]
fn test_expand_inputs_sorts_directory_entries() {
    let dir = tempdir().unwrap();
    write(&dir, "b.arw", "");
    write(&dir, "a.arw", "");
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    let loose = dir.path().join("missing.csv");

    let files = expand_inputs(&[dir.path().to_path_buf(), loose.clone()]).unwrap();
    assert_eq!(
        files,
        vec![dir.path().join("a.arw"), dir.path().join("b.arw"), loose]
    );
}

#[test]
fn test_non_finite_cell_skips_only_that_file() {
    let dir = tempdir().unwrap();
    write(&dir, "A_good.arw", WATERS);
    write(&dir, "B_bad.arw", &WATERS.replace("2.0\t6.0", "NaN\t6.0"));
    write(&dir, "C_inf.arw", &WATERS.replace("3.0\t4.0", "3.0\tinf"));

    let mut settings = UserSettings::in_memory();
    let mut source = NonInteractive;
    let outcome = Pipeline::new(explicit_options(), &mut settings, &mut source)
        .run(&[dir.path()])
        .unwrap();

    assert_eq!(outcome.decoded.len(), 1);
    assert!(outcome.decoded[0].0.ends_with("A_good.arw"));
    let skipped: Vec<&Path> = outcome.skipped.iter().map(|s| s.path.as_path()).collect();
    assert_eq!(skipped.len(), 2);
    assert!(skipped[0].ends_with("B_bad.arw"));
    assert!(skipped[1].ends_with("C_inf.arw"));
    assert!(outcome.skipped[0].reason.contains("NaN"));
    assert!(outcome
        .experiment
        .hplc()
        .unwrap()
        .iter()
        .all(|r| r.time.is_finite() && r.value.is_finite()));
}

#[test]
fn test_single_cell_data_line_is_skipped() {
    let dir = tempdir().unwrap();
    let good = write(&dir, "good.arw", WATERS);
    let short = write(&dir, "short.arw", &WATERS.replace("4.0\t1.0", "4.0"));

    let mut settings = UserSettings::in_memory();
    let mut source = NonInteractive;
    let outcome = Pipeline::new(explicit_options(), &mut settings, &mut source)
        .run(&[good, short])
        .unwrap();

    assert_eq!(outcome.decoded.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].path.ends_with("short.arw"));
}

#[test]
fn test_repeated_timepoint_is_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let good = write(&dir, "good.arw", WATERS);
    let repeated = write(&dir, "repeated.arw", &WATERS.replace("3.0\t4.0", "2.0\t4.0"));

    let mut settings = UserSettings::in_memory();
    let mut source = NonInteractive;
    let outcome = Pipeline::new(explicit_options(), &mut settings, &mut source)
        .run(&[good, repeated])
        .unwrap();

    assert_eq!(outcome.decoded.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].reason.contains("Malformed"));
}
