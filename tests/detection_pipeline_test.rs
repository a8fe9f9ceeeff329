//! End-to-end detection over synthetic matches
//!
//! Each test renders a scripted match (strike audio plus two animated
//! players), runs the full engine and compares the result against the
//! scripted rally boundaries. Padding widens every detection by about a
//! second on each side, so boundary checks use a 1.5 s tolerance.

use rally_detector::media::{SyntheticMatch, SyntheticRally};
use rally_detector::{
    AccuracyEvaluator, CancellationToken, DetectionStage, RallyDetectionEngine,
    RallyDetectionResult, ThresholdConfig,
};

const BOUNDARY_TOLERANCE: f64 = 1.5;

fn detect(config: ThresholdConfig, session: &SyntheticMatch, audio: bool) -> RallyDetectionResult {
    let engine = RallyDetectionEngine::new(config, session.media_source(audio))
        .expect("valid configuration");
    engine
        .detect(&CancellationToken::new())
        .expect("detection should succeed")
        .into_result()
        .expect("run was not cancelled")
}

fn scripted_match() -> SyntheticMatch {
    SyntheticMatch::new(
        90.0,
        vec![
            SyntheticRally::new(6.0, 18.0),
            SyntheticRally::new(32.0, 55.0).with_hit_interval(0.9),
            SyntheticRally::new(70.0, 80.0).with_intensity(1.2),
        ],
    )
}

#[test]
fn test_scripted_match_is_fully_recovered() {
    let session = scripted_match();
    let result = detect(ThresholdConfig::default(), &session, true);

    assert_eq!(result.video_id, "synthetic-match");
    assert!(result.audio_available);
    assert_eq!(result.count(), 3, "{:#?}", result.diagnostics);

    let truth = session.ground_truth();
    let report = AccuracyEvaluator::new(BOUNDARY_TOLERANCE).evaluate(&result.rallies, &truth.rallies);
    assert_eq!(report.metrics.true_positives, 3, "{}", report.render());
    assert_eq!(report.metrics.false_positives, 0);
    assert!(report.metrics.max_boundary_error < BOUNDARY_TOLERANCE * 2f64.sqrt());
}

#[test]
fn test_result_invariants_hold() {
    let result = detect(ThresholdConfig::default(), &scripted_match(), true);

    for pair in result.rallies.windows(2) {
        assert!(pair[0].start_time() <= pair[1].start_time());
        assert!(pair[0].end_time() <= pair[1].start_time(), "rallies overlap");
    }
    for rally in &result.rallies {
        assert!(rally.end_time() > rally.start_time());
        assert!(rally.start_time() >= 0.0 && rally.end_time() <= result.video_duration);
        assert!((0.0..=100.0).contains(&rally.excitement_score()));
        assert!((0.0..=1.0).contains(&rally.detection_confidence()));
        assert!(rally.hit_count() > 0);
    }

    let ranked = result.ranked();
    for pair in ranked.windows(2) {
        assert!(pair[0].excitement_score() >= pair[1].excitement_score());
    }
    assert_eq!(result.top_n(2).len(), 2);
}

#[test]
fn test_generated_match_accuracy() {
    let mut session = SyntheticMatch::generate(11, 5);
    // Keep every generated rally clearly above the movement threshold.
    for rally in &mut session.rallies {
        rally.intensity = rally.intensity.max(1.0);
        rally.end = rally.end.max(rally.start + 8.0);
    }
    let result = detect(ThresholdConfig::default(), &session, true);

    let report = AccuracyEvaluator::new(BOUNDARY_TOLERANCE)
        .evaluate(&result.rallies, &session.ground_truth().rallies);
    assert!(report.metrics.recall() >= 0.8, "{}", report.render());
    assert!(report.metrics.precision() >= 0.8, "{}", report.render());
}

#[test]
fn test_chunked_run_merges_rally_across_boundary() {
    let mut config = ThresholdConfig::default();
    config.chunk_duration = 60.0;
    config.max_rally_duration = 40.0;
    config.max_concurrent_chunks = 3;

    let session = SyntheticMatch::new(
        200.0,
        vec![
            SyntheticRally::new(20.0, 35.0),
            // Crosses the 60 s chunk edge
            SyntheticRally::new(50.0, 72.0),
            SyntheticRally::new(140.0, 155.0),
        ],
    );
    let result = detect(config, &session, true);

    assert_eq!(result.diagnostics.chunk_count, 4);
    assert_eq!(result.count(), 3, "{:#?}", result.diagnostics);
    let spanning = &result.rallies[1];
    assert!((spanning.start_time() - 50.0).abs() < BOUNDARY_TOLERANCE);
    assert!((spanning.end_time() - 72.0).abs() < BOUNDARY_TOLERANCE);
}

#[test]
fn test_short_pause_at_chunk_edge_keeps_rally_whole() {
    // Play stops 0.2 s before the 60 s edge and resumes 1.8 s later.
    let session = SyntheticMatch::new(
        120.0,
        vec![
            SyntheticRally::new(45.0, 59.8),
            SyntheticRally::new(61.6, 75.0),
        ],
    );
    let mut chunked = ThresholdConfig::default();
    chunked.chunk_duration = 60.0;
    chunked.max_rally_duration = 40.0;
    let mut single_pass = chunked.clone();
    single_pass.enable_chunking = false;

    let whole = detect(single_pass, &session, true);
    let split = detect(chunked, &session, true);

    assert_eq!(whole.diagnostics.chunk_count, 1);
    assert_eq!(split.diagnostics.chunk_count, 2);
    assert_eq!(whole.count(), 1, "{:#?}", whole.diagnostics);
    assert_eq!(split.count(), 1, "{:#?}", split.diagnostics);
    let rally = &split.rallies[0];
    assert!((rally.start_time() - 45.0).abs() < BOUNDARY_TOLERANCE);
    assert!((rally.end_time() - 75.0).abs() < BOUNDARY_TOLERANCE);
}

#[test]
fn test_sequential_and_parallel_runs_agree() {
    let session = scripted_match();
    let mut sequential = ThresholdConfig::default();
    sequential.enable_parallel_processing = false;

    let parallel = detect(ThresholdConfig::default(), &session, true);
    let serial = detect(sequential, &session, true);

    assert_eq!(parallel.count(), serial.count());
    for (a, b) in parallel.rallies.iter().zip(&serial.rallies) {
        assert_eq!(a.start_time(), b.start_time());
        assert_eq!(a.end_time(), b.end_time());
        assert_eq!(a.excitement_score(), b.excitement_score());
    }
}

#[test]
fn test_repeated_runs_are_deterministic_apart_from_ids() {
    let session = scripted_match();
    let first = detect(ThresholdConfig::default(), &session, true);
    let second = detect(ThresholdConfig::default(), &session, true);

    assert_eq!(first.count(), second.count());
    for (a, b) in first.rallies.iter().zip(&second.rallies) {
        assert_eq!(a.start_time(), b.start_time());
        assert_eq!(a.end_time(), b.end_time());
        assert_eq!(a.detection_confidence(), b.detection_confidence());
        assert_eq!(a.excitement_score(), b.excitement_score());
        assert_ne!(a.id(), b.id());
    }
}

#[test]
fn test_movement_only_detection_without_audio() {
    let mut config = ThresholdConfig::default();
    config.min_combined_confidence = 0.45;
    let session = SyntheticMatch::new(
        70.0,
        vec![
            SyntheticRally::new(8.0, 24.0).with_intensity(1.3),
            SyntheticRally::new(40.0, 58.0).with_intensity(1.3),
        ],
    );
    let result = detect(config, &session, false);

    assert!(!result.audio_available);
    assert_eq!(result.count(), 2, "{:#?}", result.diagnostics);
    for rally in &result.rallies {
        assert_eq!(rally.hit_count(), 0);
        assert!(rally.excitement_score() > 0.0);
    }
}

#[test]
fn test_quiet_match_yields_no_rallies() {
    let session = SyntheticMatch::new(40.0, Vec::new());
    let result = detect(ThresholdConfig::default(), &session, true);

    assert!(result.is_empty());
    assert_eq!(result.average_duration(), 0.0);
    assert!(result.top_scoring().is_none());
}

#[test]
fn test_progress_reports_every_stage_in_order() {
    let mut config = ThresholdConfig::default();
    config.chunk_duration = 60.0;
    config.max_rally_duration = 40.0;
    let session = SyntheticMatch::new(110.0, vec![SyntheticRally::new(10.0, 25.0)]);
    let engine = RallyDetectionEngine::new(config, session.media_source(true)).unwrap();
    let mut progress = engine.subscribe_progress();

    let outcome = engine.detect(&CancellationToken::new()).unwrap();
    assert!(!outcome.is_cancelled());

    let mut updates = Vec::new();
    while let Ok(update) = progress.try_recv() {
        updates.push(update);
    }
    let stages: Vec<DetectionStage> = updates.iter().map(|u| u.stage).collect();
    assert_eq!(stages.first(), Some(&DetectionStage::Planning));
    assert_eq!(stages.last(), Some(&DetectionStage::Completed));
    for expected in [
        DetectionStage::Analyzing,
        DetectionStage::Merging,
        DetectionStage::Fusing,
        DetectionStage::Scoring,
    ] {
        assert!(stages.contains(&expected), "missing {expected:?} in {stages:?}");
    }

    let analyzing: Vec<_> = updates
        .iter()
        .filter(|u| u.stage == DetectionStage::Analyzing)
        .collect();
    assert_eq!(analyzing.iter().map(|u| u.completed_chunks).max(), Some(2));
    assert!(analyzing.iter().all(|u| u.total_chunks == 2));
    assert_eq!(updates.last().map(|u| u.fraction()), Some(1.0));
}
