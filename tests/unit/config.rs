use super::*;

#[test]
fn defaults_match_documented_values() {
    let cfg = EngineConfig::default();
    assert_eq!(cfg.default_canvas.width, 1920);
    assert_eq!(cfg.default_canvas.height, 1080);
    assert_eq!(cfg.fps, Fps::new(30, 1).unwrap());
    assert_eq!(cfg.image_duration, 5.0);
    assert_eq!(cfg.transition_duration, 1.0);
    assert_eq!(cfg.text_fade_in, 0.5);
    assert_eq!(cfg.text_fade_out, 1.0);
    assert_eq!(cfg.canvas_policy, CanvasPolicy::TallestClip);
    assert_eq!(cfg.fillers, FillerConfig::Synthesized);
    assert!(cfg.validate().is_ok());
}

#[test]
fn partial_json_keeps_defaults() {
    let json = r#"{ "image_duration": 3.0, "canvas_policy": "fixed" }"#;
    let cfg = EngineConfig::from_reader(json.as_bytes()).unwrap();
    assert_eq!(cfg.image_duration, 3.0);
    assert_eq!(cfg.canvas_policy, CanvasPolicy::Fixed);
    assert_eq!(cfg.output_file_name, DEFAULT_OUTPUT_FILE_NAME);
}

#[test]
fn bundled_fillers_parse_from_tagged_json() {
    let json = r#"{ "fillers": { "kind": "bundled", "silence": "res/silence.mp3", "background": "res/black.mov" } }"#;
    let cfg = EngineConfig::from_reader(json.as_bytes()).unwrap();
    assert_eq!(
        cfg.fillers,
        FillerConfig::Bundled {
            silence: PathBuf::from("res/silence.mp3"),
            background: PathBuf::from("res/black.mov"),
        }
    );
}

#[test]
fn non_positive_durations_are_rejected() {
    let cfg = EngineConfig {
        image_duration: 0.0,
        ..Default::default()
    };
    assert!(matches!(cfg.validate(), Err(MontageError::Validation(_))));

    let cfg = EngineConfig {
        text_fade_in: f64::NAN,
        ..Default::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = EngineConfig::from_reader("{ not json".as_bytes()).unwrap_err();
    assert!(matches!(err, MontageError::Serde(_)));
}

#[test]
fn output_path_joins_dir_and_file_name() {
    let cfg = EngineConfig {
        output_dir: Some(PathBuf::from("/var/out")),
        ..Default::default()
    };
    assert_eq!(cfg.output_path(), PathBuf::from("/var/out/mergedVideo.mp4"));

    let tmp = EngineConfig::default().output_path();
    assert!(tmp.starts_with(std::env::temp_dir()));
}
