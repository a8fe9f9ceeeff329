//! Threshold configuration persistence and validation

use rally_detector::{ConfigError, ErrorCode, ThresholdConfig};
use tempfile::TempDir;

#[test]
fn test_every_field_survives_a_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("thresholds.json");

    let mut config = ThresholdConfig::default();
    config.fft_window_size = 4096;
    config.audio_hop_size = 512;
    config.hit_frequency_min = 650.0;
    config.video_analysis_fps = 8.0;
    config.rally_start_frame_count = 4;
    config.max_pause_duration = 6.5;
    config.video_weight = 0.4;
    config.audio_weight = 0.4;
    config.audio_video_sync_offset = -0.12;
    config.exciting_hit_rate = 1.5;
    config.enable_chunking = false;
    config.max_concurrent_chunks = 4;
    config.chunk_merge_gap = 1.25;

    config.save_to_file(&path).unwrap();
    let loaded = ThresholdConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_document_fills_defaults() {
    let config = ThresholdConfig::from_json(r#"{"videoAnalysisFps": 10.0}"#).unwrap();
    assert_eq!(config.video_analysis_fps, 10.0);
    assert_eq!(config.fft_window_size, ThresholdConfig::default().fft_window_size);
}

#[test]
fn test_fusion_weights_must_sum_to_one() {
    let err = ThresholdConfig::from_json(
        r#"{"videoWeight": 0.6, "audioWeight": 0.3, "temporalWeight": 0.2}"#,
    )
    .unwrap_err();
    match err {
        ConfigError::WeightSum { ref group, sum } => {
            assert_eq!(group, "fusion");
            assert!((sum - 1.1).abs() < 1e-9);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("fusion"));
    assert!(err.code() > 0);
}

#[test]
fn test_invalid_value_names_the_parameter() {
    let err = ThresholdConfig::from_json(r#"{"minRallyDuration": -2.0}"#).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { ref parameter, .. } if parameter == "minRallyDuration"));
}

#[test]
fn test_invalid_file_is_not_replaced_by_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{"audioHopSize": 8192}"#).unwrap();

    let err = ThresholdConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRelation { .. }));

    let missing = ThresholdConfig::load_from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));
}

#[test]
fn test_save_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("thresholds.json");
    let mut config = ThresholdConfig::default();
    config.chunk_duration = 60.0;

    assert!(config.save_to_file(&path).is_err());
    assert!(!path.exists());
}
