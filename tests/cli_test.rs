use std::path::Path;
use std::process::{Command, Output};

use rally_detector::media::{SyntheticMatch, SyntheticRally, WavAudioProvider};
use rally_detector::{RallyDetectionResult, ThresholdConfig};
use serde_json::Value;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rally_cli"))
}

fn run(args: &[&str]) -> Output {
    cli().args(args).output().expect("spawn rally_cli")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf8 temp path")
}

#[test]
fn config_defaults_prints_loadable_json() {
    let output = run(&["config", "defaults"]);
    assert!(output.status.success(), "exited with {:?}", output.status.code());

    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let config = ThresholdConfig::from_json(&stdout).expect("defaults parse back");
    assert_eq!(config, ThresholdConfig::default());
}

#[test]
fn config_validate_rejects_bad_weights() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"durationWeight": 0.9}"#).unwrap();

    let output = run(&["config", "validate", path_arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("scoring"), "stderr: {stderr}");
}

#[test]
fn simulate_export_then_detect_and_evaluate() {
    let dir = TempDir::new().unwrap();
    let session_dir = dir.path().join("session");
    let simulated = dir.path().join("simulated.json");

    let output = run(&[
        "simulate",
        "--seed",
        "3",
        "--rallies",
        "2",
        "--export-dir",
        path_arg(&session_dir),
        "--output",
        path_arg(&simulated),
    ]);
    assert!(output.status.success(), "simulate exited with {:?}", output.status.code());
    for name in ["audio.wav", "poses.json", "ground_truth.json"] {
        assert!(session_dir.join(name).exists(), "{name} not exported");
    }
    let result: RallyDetectionResult =
        serde_json::from_str(&std::fs::read_to_string(&simulated).unwrap()).unwrap();
    assert_eq!(result.video_id, "synthetic-3");

    let detected = dir.path().join("detected.json");
    let output = run(&[
        "detect",
        "--poses",
        path_arg(&session_dir.join("poses.json")),
        "--audio",
        path_arg(&session_dir.join("audio.wav")),
        "--video-id",
        "exported",
        "--output",
        path_arg(&detected),
    ]);
    assert!(output.status.success(), "detect exited with {:?}", output.status.code());
    let result: RallyDetectionResult =
        serde_json::from_str(&std::fs::read_to_string(&detected).unwrap()).unwrap();
    assert_eq!(result.video_id, "exported");
    assert!(result.audio_available);

    let output = run(&[
        "evaluate",
        "--detections",
        path_arg(&detected),
        "--ground-truth",
        path_arg(&session_dir.join("ground_truth.json")),
        "--tolerance",
        "1.5",
    ]);
    assert!(output.status.success(), "evaluate exited with {:?}", output.status.code());
    let metrics: Value = serde_json::from_slice(&output.stdout).expect("metrics JSON");
    assert!(metrics["recall"].is_number());
    assert_eq!(metrics["tolerance"], 1.5);

    // Accuracy can never exceed 1.0
    let output = run(&[
        "evaluate",
        "--detections",
        path_arg(&detected),
        "--ground-truth",
        path_arg(&session_dir.join("ground_truth.json")),
        "--min-accuracy",
        "1.01",
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn validate_annotations_lists_every_problem() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truth.json");
    std::fs::write(
        &path,
        r#"{"video": "m.mp4", "rallies": [
            {"startTime": 10.0, "endTime": 5.0},
            {"startTime": 20.0, "endTime": 30.0, "excitementScore": 140},
            {"startTime": 25.0, "endTime": 35.0}
        ]}"#,
    )
    .unwrap();

    let output = run(&["validate-annotations", path_arg(&path)]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(stdout.contains("3 problem(s)"), "stdout: {stdout}");
    assert!(stdout.contains("rally #0"));
    assert!(stdout.contains("rally #1"));
    assert!(stdout.contains("rally #2"));
}

#[test]
fn detect_reports_missing_pose_file() {
    let output = run(&["detect", "--poses", "/nonexistent/poses.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}

#[test]
fn detect_falls_back_to_movement_when_wav_is_empty() {
    let dir = TempDir::new().unwrap();
    let poses = dir.path().join("poses.json");
    let audio = dir.path().join("empty.wav");
    let detected = dir.path().join("detected.json");

    let session = SyntheticMatch::new(
        40.0,
        vec![SyntheticRally::new(8.0, 24.0).with_intensity(1.3)],
    );
    std::fs::write(&poses, serde_json::to_string(&session.pose_track(5.0)).unwrap()).unwrap();
    WavAudioProvider::from_samples(Vec::new(), 22_050, 1)
        .write_wav(&audio)
        .unwrap();

    let output = run(&[
        "detect",
        "--poses",
        path_arg(&poses),
        "--audio",
        path_arg(&audio),
        "--output",
        path_arg(&detected),
    ]);
    assert!(output.status.success(), "detect exited with {:?}", output.status.code());
    let result: RallyDetectionResult =
        serde_json::from_str(&std::fs::read_to_string(&detected).unwrap()).unwrap();
    assert!(!result.audio_available);
    assert_eq!(result.video_id, "poses");
}
