use super::*;
use crate::decoders::Decoder;
use std::io::Cursor;
use tempfile::tempdir;

const SAMPLE_SETTINGS: &str = r#"{
  "flow_rates": {
    "Sup6Inc": 0.5,
    "S200_Inc": 0.75,
    "Inc": 1.0
  },
  "default_column_volume": 24.0
}"#;

fn resolve_flow(
    explicit: &ExplicitMetadata,
    settings: &mut UserSettings,
    session: &mut ResolutionOverride,
    source: &mut ScriptedSource,
    method: Option<&str>,
) -> Result<f64, MetadataError> {
    MetadataResolver::new(Decoder::Waters, explicit, settings, session, source)
        .flow_rate(method, None, "test.arw")
}

#[test]
fn test_settings_parsing() {
    let settings = UserSettings::from_json(SAMPLE_SETTINGS).unwrap();
    assert_eq!(settings.flow_rates().len(), 3);
    assert_eq!(settings.default_column_volume(), Some(24.0));
    assert!(settings.path().is_none());
}

#[test]
fn test_check_flow_rate_substring_match() {
    let mut settings = UserSettings::in_memory();
    settings.set_flow_rate("Sup6", 0.5).unwrap();
    settings.set_flow_rate("S200", 0.75).unwrap();

    assert_eq!(
        settings.check_flow_rate("Sup6Inc_10_300_TrpGFP_LineA"),
        FlowRateMatch::Unique {
            key: "Sup6".to_string(),
            flow_rate: 0.5
        }
    );
    assert_eq!(settings.check_flow_rate("Superose_12"), FlowRateMatch::NoMatch);
}

#[test]
fn test_check_flow_rate_ambiguous() {
    let settings = UserSettings::from_json(SAMPLE_SETTINGS).unwrap();
    match settings.check_flow_rate("Sup6Inc_10_300") {
        FlowRateMatch::Ambiguous(keys) => {
            assert_eq!(keys, vec!["Inc".to_string(), "Sup6Inc".to_string()]);
        }
        other => panic!("expected ambiguous match, got {:?}", other),
    }
}

#[test]
fn test_settings_mutations() {
    let mut settings = UserSettings::in_memory();
    settings
        .update_flow_rates(vec![("A".to_string(), 1.0), ("B".to_string(), 2.0)])
        .unwrap();
    assert_eq!(settings.delete_flow_rate("A").unwrap(), 1.0);
    assert!(matches!(
        settings.delete_flow_rate("A"),
        Err(MetadataError::UnknownFlowRate(_))
    ));
    assert!(settings.set_flow_rate("C", -1.0).is_err());
    assert!(settings.set_default_column_volume(Some(0.0)).is_err());
    settings.set_default_column_volume(Some(24.0)).unwrap();
    settings.set_default_column_volume(None).unwrap();
    assert_eq!(settings.default_column_volume(), None);
}

#[test]
fn test_settings_file_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let mut settings = UserSettings::load(&path).unwrap();
    assert!(settings.flow_rates().is_empty());
    assert!(!path.exists());

    settings.set_flow_rate("Sup6", 0.5).unwrap();
    assert!(!path.exists(), "mutation alone must not write");
    settings.save().unwrap();

    let reloaded = UserSettings::load(&path).unwrap();
    assert_eq!(reloaded.flow_rates().get("Sup6"), Some(&0.5));
    assert_eq!(reloaded.path(), Some(path.as_path()));
}

#[test]
fn test_save_replaces_file_without_leftovers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, SAMPLE_SETTINGS).unwrap();

    let mut settings = UserSettings::load(&path).unwrap();
    settings.delete_flow_rate("Inc").unwrap();
    settings.set_flow_rate("Superose", 0.4).unwrap();
    settings.save().unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("settings.json")]);

    let reloaded = UserSettings::load(&path).unwrap();
    assert_eq!(reloaded.flow_rates().len(), 3);
    assert_eq!(reloaded.flow_rates().get("Superose"), Some(&0.4));
    assert!(reloaded.flow_rates().get("Inc").is_none());
    assert_eq!(reloaded.default_column_volume(), Some(24.0));
}

#[test]
fn test_registry_match_never_prompts() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    settings.set_flow_rate("Sup6Inc", 0.5).unwrap();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::empty();

    let flow = resolve_flow(
        &explicit,
        &mut settings,
        &mut session,
        &mut source,
        Some("Sup6Inc_10_300_TrpGFP_LineA"),
    )
    .unwrap();
    assert_eq!(flow, 0.5);
    assert!(source.asked().is_empty());
}

#[test]
fn test_session_override_beats_registry() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    settings.set_flow_rate("Sup6Inc", 0.5).unwrap();
    let mut session = ResolutionOverride {
        flow_rate: Some(0.8),
        ..Default::default()
    };
    let mut source = ScriptedSource::empty();

    let flow = resolve_flow(&explicit, &mut settings, &mut session, &mut source, Some("Sup6Inc")).unwrap();
    assert_eq!(flow, 0.8);
    assert!(source.asked().is_empty());
}

#[test]
fn test_explicit_beats_everything() {
    let explicit = ExplicitMetadata {
        flow_rate: Some(0.25),
        ..Default::default()
    };
    let mut settings = UserSettings::in_memory();
    settings.set_flow_rate("Sup6Inc", 0.5).unwrap();
    let mut session = ResolutionOverride {
        flow_rate: Some(0.8),
        ..Default::default()
    };
    let mut source = ScriptedSource::empty();

    let flow = resolve_flow(&explicit, &mut settings, &mut session, &mut source, Some("Sup6Inc")).unwrap();
    assert_eq!(flow, 0.25);
}

#[test]
fn test_prompt_retries_until_number() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["fast", "-2", "0.5", "y", "n"]);

    let flow = resolve_flow(&explicit, &mut settings, &mut session, &mut source, Some("M1")).unwrap();
    assert_eq!(flow, 0.5);
    assert_eq!(session.flow_rate, Some(0.5));
    assert!(settings.flow_rates().is_empty());
    assert_eq!(source.asked().len(), 5);
    assert_eq!(source.remaining(), 0);
}

#[test]
fn test_ambiguous_registry_falls_through_to_prompt() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::from_json(SAMPLE_SETTINGS).unwrap();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["0.9", "n", "n"]);

    let flow = resolve_flow(&explicit, &mut settings, &mut session, &mut source, Some("Sup6Inc_x")).unwrap();
    assert_eq!(flow, 0.9);
    assert!(session.flow_rate.is_none());
}

#[test]
fn test_prompted_flow_rate_persisted_with_consent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::load(&path).unwrap();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["0.4", "n", "y"]);

    resolve_flow(&explicit, &mut settings, &mut session, &mut source, Some("MethodX")).unwrap();
    assert!(session.flow_rate.is_none());

    let reloaded = UserSettings::load(&path).unwrap();
    assert_eq!(reloaded.flow_rates().get("MethodX"), Some(&0.4));
}

#[test]
fn test_no_method_skips_persist_question() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["1.0", "y"]);

    resolve_flow(&explicit, &mut settings, &mut session, &mut source, None).unwrap();
    assert_eq!(source.asked().len(), 2);
}

#[test]
fn test_exhausted_source_is_an_error() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["not a number"]);

    let result = resolve_flow(&explicit, &mut settings, &mut session, &mut source, None);
    assert!(matches!(result, Err(MetadataError::InputExhausted(_))));
}

#[test]
fn test_file_hint_beats_session() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    let mut session = ResolutionOverride {
        flow_rate: Some(0.8),
        channel_name: Some("prompted".to_string()),
        ..Default::default()
    };
    let mut source = NonInteractive;
    let mut resolver = MetadataResolver::new(Decoder::Agilent, &explicit, &mut settings, &mut session, &mut source);

    assert_eq!(resolver.flow_rate(None, Some(1.0), "a.csv").unwrap(), 1.0);
    assert_eq!(resolver.channel_name(Some("540"), "a.csv").unwrap(), "540");
    assert_eq!(resolver.channel_name(None, "a.csv").unwrap(), "prompted");
}

#[test]
fn test_channel_prompt_remembered() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["  ", "GFP", "y"]);
    let mut resolver = MetadataResolver::new(Decoder::Agilent, &explicit, &mut settings, &mut session, &mut source);

    assert_eq!(resolver.channel_name(None, "a.csv").unwrap(), "GFP");
    assert_eq!(resolver.channel_name(None, "b.csv").unwrap(), "GFP");
    assert_eq!(session.channel_name.as_deref(), Some("GFP"));
}

#[test]
fn test_detector_choice_recorded() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["7", "2"]);
    let candidates = vec!["Detector A".to_string(), "Detector B".to_string()];

    let mut resolver =
        MetadataResolver::new(Decoder::ShimadzuModern, &explicit, &mut settings, &mut session, &mut source);
    assert_eq!(resolver.preferred_detector("UV", &candidates).unwrap(), "Detector B");
    // second conflict in the same run is answered from the session
    assert_eq!(resolver.preferred_detector("UV", &candidates).unwrap(), "Detector B");

    assert_eq!(session.preferred_detector.as_deref(), Some("Detector B"));
    assert_eq!(source.asked().len(), 2);
}

#[test]
fn test_detector_by_name() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["Detector A"]);
    let candidates = vec!["Detector A".to_string(), "Detector B".to_string()];

    let mut resolver =
        MetadataResolver::new(Decoder::ShimadzuModern, &explicit, &mut settings, &mut session, &mut source);
    assert_eq!(resolver.preferred_detector("UV", &candidates).unwrap(), "Detector A");
}

#[test]
fn test_column_volume_tiers() {
    let explicit = ExplicitMetadata::default();
    let mut settings = UserSettings::in_memory();
    settings.set_default_column_volume(Some(24.0)).unwrap();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::empty();
    let mut resolver = MetadataResolver::new(Decoder::Akta, &explicit, &mut settings, &mut session, &mut source);
    assert_eq!(resolver.column_volume("run.csv").unwrap(), 24.0);

    let mut settings = UserSettings::in_memory();
    let mut session = ResolutionOverride::default();
    let mut source = ScriptedSource::new(["abc", "120", "y", "y"]);
    let mut resolver = MetadataResolver::new(Decoder::Akta, &explicit, &mut settings, &mut session, &mut source);
    assert_eq!(resolver.column_volume("run.csv").unwrap(), 120.0);
    assert_eq!(session.column_volume, Some(120.0));
    assert_eq!(settings.default_column_volume(), Some(120.0));
}

#[test]
fn test_session_overrides_isolated_per_decoder() {
    let mut overrides = SessionOverrides::new();
    overrides.for_decoder(Decoder::Waters).flow_rate = Some(0.5);

    assert_eq!(overrides.get(Decoder::Waters).and_then(|o| o.flow_rate), Some(0.5));
    assert!(overrides.get(Decoder::Agilent).is_none());

    overrides.clear(Decoder::Waters);
    assert!(overrides.get(Decoder::Waters).is_none());
}

#[test]
fn test_terminal_source_reads_lines() {
    let input = Cursor::new("0.5\nyes\n");
    let mut output = Vec::new();
    let mut source = TerminalSource::new(input, &mut output);

    assert_eq!(source.ask_flow_rate("x.arw").unwrap(), "0.5");
    assert!(source.confirm("Remember?").unwrap());
    assert!(matches!(
        source.ask_channel("x.csv"),
        Err(MetadataError::InputExhausted(_))
    ));
    drop(source);

    let shown = String::from_utf8(output).unwrap();
    assert!(shown.contains("Flow rate for x.arw"));
}
