//! RallyDetectionEngine: orchestration of one detection run.
//!
//! The engine receives its configuration and media providers at construction
//! and owns no global state. A run plans chunks, analyses each chunk (audio
//! and movement concurrently when enabled, chunks on a bounded worker pool),
//! then at a single synchronization point merges candidates across chunk
//! boundaries and drives duration filtering, fusion and scoring in that order.

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::analysis::audio::{AudioAnalysis, AudioAnalyzer, HitCriteria};
use crate::analysis::fusion::FeatureFusion;
use crate::analysis::movement::{MovementAnalysis, MovementAnalyzer};
use crate::analysis::scoring::{ExcitementScorer, ScoreBreakdown};
use crate::analysis::temporal::{ActivitySignal, CandidateInterval, TemporalAnalyzer};
use crate::config::ThresholdConfig;
use crate::error::{log_detection_error, DetectionError, MediaError};
use crate::media::MediaSource;
use crate::time_range::TimeRange;

pub mod cancel;
pub mod chunking;
pub mod report;
pub mod result;

pub use cancel::{CancellationToken, DetectionProgress, DetectionStage};
pub use report::DiagnosticReport;
pub use result::{
    DetectedRally, DetectionDiagnostics, DetectionSummary, RallyDetectionResult,
    RallyMeasurements, RejectedCandidate, RejectionReason,
};

/// Capacity of the progress broadcast channel
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// How a detection run ended
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Completed(RallyDetectionResult),
    /// Cancellation was requested; partial results were discarded
    Cancelled,
}

impl DetectionOutcome {
    pub fn into_result(self) -> Option<RallyDetectionResult> {
        match self {
            DetectionOutcome::Completed(result) => Some(result),
            DetectionOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DetectionOutcome::Cancelled)
    }
}

/// Everything one chunk contributes before the merge
struct ChunkAnalysis {
    audio: Option<AudioAnalysis>,
    movement: MovementAnalysis,
    signals: Vec<ActivitySignal>,
    candidates: Vec<CandidateInterval>,
}

/// Detection pipeline for one video
pub struct RallyDetectionEngine {
    config: Arc<ThresholdConfig>,
    source: MediaSource,
    progress_tx: broadcast::Sender<DetectionProgress>,
    audio: AudioAnalyzer,
    movement: MovementAnalyzer,
    temporal: TemporalAnalyzer,
    fusion: FeatureFusion,
    scorer: ExcitementScorer,
}

impl RallyDetectionEngine {
    /// Validate `config` and build an engine over `source`
    pub fn new(config: ThresholdConfig, source: MediaSource) -> Result<Self, DetectionError> {
        Self::with_shared_config(Arc::new(config), source)
    }

    /// Build an engine sharing an already-loaded configuration
    pub fn with_shared_config(
        config: Arc<ThresholdConfig>,
        source: MediaSource,
    ) -> Result<Self, DetectionError> {
        config.validate()?;
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Ok(Self {
            audio: AudioAnalyzer::new(config.clone()),
            movement: MovementAnalyzer::new(config.clone()),
            temporal: TemporalAnalyzer::new(config.clone()),
            fusion: FeatureFusion::new(config.clone()),
            scorer: ExcitementScorer::new(config.clone()),
            config,
            source,
            progress_tx,
        })
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn video_id(&self) -> &str {
        &self.source.video_id
    }

    /// Receive progress updates for subsequent runs
    pub fn subscribe_progress(&self) -> broadcast::Receiver<DetectionProgress> {
        self.progress_tx.subscribe()
    }

    fn publish(&self, stage: DetectionStage, completed: usize, total: usize) {
        // No subscribers is fine.
        let _ = self
            .progress_tx
            .send(DetectionProgress::new(stage, completed, total));
    }

    /// Run detection over the whole video
    pub fn detect(&self, cancel: &CancellationToken) -> Result<DetectionOutcome, DetectionError> {
        match self.run(cancel) {
            Ok(Some(result)) => Ok(DetectionOutcome::Completed(result)),
            Ok(None) | Err(DetectionError::Media(MediaError::Cancelled)) => {
                tracing::info!("[Engine] Detection for {} cancelled", self.source.video_id);
                self.publish(DetectionStage::Cancelled, 0, 0);
                Ok(DetectionOutcome::Cancelled)
            }
            Err(err) => {
                log_detection_error(&err, "RallyDetectionEngine::detect");
                Err(err)
            }
        }
    }

    fn run(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<RallyDetectionResult>, DetectionError> {
        let started = Instant::now();
        let duration = self.source.video.duration();
        if !(duration.is_finite() && duration > 0.0) {
            return Err(DetectionError::EmptyVideo { duration });
        }

        self.publish(DetectionStage::Planning, 0, 0);
        let chunks = chunking::plan_chunks(duration, &self.config);
        let total = chunks.len();
        tracing::info!(
            "[Engine] Detecting rallies in {} ({:.1}s, {} chunk(s), audio {})",
            self.source.video_id,
            duration,
            total,
            if self.source.audio.is_some() { "present" } else { "absent" }
        );

        let analyses = self.analyze_chunks(&chunks, cancel)?;
        if cancel.is_cancelled() {
            return Ok(None);
        }

        // Synchronization point: every chunk has completed.
        self.publish(DetectionStage::Merging, total, total);
        let whole = TimeRange::new(0.0, duration);
        let audio_available =
            self.source.audio.is_some() && analyses.iter().all(|chunk| chunk.audio.is_some());

        let mut diagnostics = DetectionDiagnostics {
            chunk_count: total,
            ..DetectionDiagnostics::default()
        };
        let mut audio_parts = Vec::with_capacity(total);
        let mut movement_parts = Vec::with_capacity(total);
        let mut signals = Vec::new();
        let mut raw_candidates = Vec::new();
        for chunk in analyses {
            signals.extend(chunk.signals);
            raw_candidates.extend(chunk.candidates);
            movement_parts.push(chunk.movement);
            if let Some(audio) = chunk.audio {
                audio_parts.push(audio);
            }
        }

        let movement =
            MovementAnalysis::concat(movement_parts, whole, self.config.video_analysis_fps);
        let audio = audio_available.then(|| {
            AudioAnalysis::concat(audio_parts, whole, HitCriteria::from_config(&self.config))
        });

        diagnostics.frames_analysed = movement.frames.len();
        diagnostics.low_confidence_frames =
            movement.frames.iter().filter(|f| f.low_confidence).count();
        diagnostics.frames_without_person =
            movement.frames.iter().filter(|f| !f.has_person).count();
        diagnostics.movement_seconds = movement.processing_time;
        if let Some(audio) = &audio {
            diagnostics.audio_windows = audio.windows_analysed;
            diagnostics.audio_peaks = audio.peaks.len();
            diagnostics.hit_sounds = audio.hit_sounds(whole).len();
            diagnostics.audio_seconds = audio.processing_time;
        }

        diagnostics.raw_candidates = raw_candidates.len();
        let merged = chunking::merge_candidates(
            raw_candidates,
            self.config.chunk_merge_gap,
            self.config.min_pause_duration_to_end,
        );
        diagnostics.merged_candidates = merged.len();

        let (kept, too_short_or_long) = self.temporal.filter_by_duration(merged);
        diagnostics.rejected.extend(too_short_or_long.into_iter().map(
            |(candidate, rejection)| RejectedCandidate {
                range: candidate.range,
                reason: RejectionReason::from_duration(rejection, candidate.duration()),
            },
        ));

        self.publish(DetectionStage::Fusing, total, total);
        let mut rallies = Vec::with_capacity(kept.len());
        for candidate in kept {
            let fused = self
                .fusion
                .fuse(&candidate, &movement, audio.as_ref(), &signals);
            if !fused.is_likely_rally() {
                tracing::debug!(
                    "[Engine] Rejected {:.1}-{:.1}s: confidence {:.2}",
                    candidate.range.start,
                    candidate.range.end,
                    fused.combined_confidence
                );
                diagnostics.rejected.push(RejectedCandidate {
                    range: candidate.range,
                    reason: RejectionReason::LowConfidence {
                        combined_confidence: fused.combined_confidence,
                        threshold: fused.acceptance_threshold,
                    },
                });
                continue;
            }

            let measurements = RallyMeasurements {
                detection_confidence: fused.combined_confidence,
                avg_movement_intensity: fused.avg_movement_intensity,
                peak_movement_intensity: fused.peak_movement_intensity,
                hit_count: fused.hit_count,
                hit_density: fused.audio_hit_density,
                continuity: fused.temporal_continuity,
            };
            if let Some(rally) =
                DetectedRally::new(candidate.range.start, candidate.range.end, measurements)
            {
                rallies.push(rally);
            }
        }
        diagnostics
            .rejected
            .sort_by(|a, b| a.range.start.total_cmp(&b.range.start));

        self.publish(DetectionStage::Scoring, total, total);
        for rally in &mut rallies {
            self.scorer.apply(rally);
        }

        let result = RallyDetectionResult {
            video_id: self.source.video_id.clone(),
            video_duration: duration,
            rallies,
            processing_time: started.elapsed().as_secs_f64(),
            audio_available,
            diagnostics,
        };
        tracing::info!(
            "[Engine] {}: {} rallies from {} candidates in {:.2}s",
            result.video_id,
            result.count(),
            result.diagnostics.merged_candidates,
            result.processing_time
        );
        self.publish(DetectionStage::Completed, total, total);
        Ok(Some(result))
    }

    /// Analyze every chunk, in parallel up to `maxConcurrentChunks`
    fn analyze_chunks(
        &self,
        chunks: &[TimeRange],
        cancel: &CancellationToken,
    ) -> Result<Vec<ChunkAnalysis>, DetectionError> {
        let total = chunks.len();
        let completed = AtomicUsize::new(0);
        let run_chunk = |range: &TimeRange| -> Result<ChunkAnalysis, DetectionError> {
            cancel.check()?;
            let analysis = self.analyze_chunk(*range, cancel)?;
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                "[Engine] Chunk {:.1}-{:.1}s done ({}/{})",
                range.start,
                range.end,
                done,
                total
            );
            self.publish(DetectionStage::Analyzing, done, total);
            Ok(analysis)
        };

        self.publish(DetectionStage::Analyzing, 0, total);
        let parallel_chunks = self.config.enable_parallel_processing
            && self.config.max_concurrent_chunks > 1
            && total > 1;
        if !parallel_chunks {
            return chunks.iter().map(run_chunk).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_concurrent_chunks.min(total))
            .thread_name(|index| format!("rally-chunk-{index}"))
            .build()
            .map_err(|err| DetectionError::WorkerPool {
                details: err.to_string(),
            })?;
        pool.install(|| chunks.par_iter().map(run_chunk).collect())
    }

    /// Audio and movement analysis plus segmentation for one chunk
    fn analyze_chunk(
        &self,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> Result<ChunkAnalysis, DetectionError> {
        let (audio, movement) = if self.config.enable_parallel_processing {
            std::thread::scope(|scope| {
                let audio_task = scope.spawn(|| self.analyze_audio(range, cancel));
                let movement = self.analyze_movement(range, cancel);
                let audio = audio_task
                    .join()
                    .map_err(|_| DetectionError::WorkerPool {
                        details: "audio analysis thread panicked".to_string(),
                    })?;
                Ok::<_, DetectionError>((audio?, movement?))
            })?
        } else {
            let audio = self.analyze_audio(range, cancel)?;
            (audio, self.analyze_movement(range, cancel)?)
        };

        let signals = self.temporal.build_signals(&movement, audio.as_ref());
        let candidates = self.temporal.segment(&signals, range);
        Ok(ChunkAnalysis {
            audio,
            movement,
            signals,
            candidates,
        })
    }

    /// Sync-corrected audio analysis, `None` when the video has no audio
    fn analyze_audio(
        &self,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> Result<Option<AudioAnalysis>, MediaError> {
        let Some(provider) = &self.source.audio else {
            return Ok(None);
        };
        // Audio for video time t sits at t + offset in the track.
        let offset = self.config.audio_video_sync_offset;
        let audio_range = TimeRange::new(
            (range.start + offset).max(0.0),
            (range.end + offset).max(0.0),
        );
        match self.audio.analyze(provider.as_ref(), audio_range, cancel) {
            Ok(analysis) => Ok(Some(self.fusion.align(analysis))),
            Err(MediaError::AudioTrackMissing) => {
                tracing::warn!(
                    "[Engine] {} has no audio track, continuing with movement only",
                    self.source.video_id
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn analyze_movement(
        &self,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> Result<MovementAnalysis, MediaError> {
        self.movement.analyze(
            self.source.video.as_ref(),
            self.source.pose.as_ref(),
            range,
            cancel,
        )
    }

    /// Per-rally scoring breakdowns; does not modify `result`
    pub fn score_breakdowns(&self, result: &RallyDetectionResult) -> Vec<ScoreBreakdown> {
        result
            .rallies
            .iter()
            .map(|rally| self.scorer.score(rally))
            .collect()
    }

    /// Human-readable diagnostics for `result`
    pub fn diagnostic_report<'a>(&'a self, result: &'a RallyDetectionResult) -> DiagnosticReport<'a> {
        DiagnosticReport::new(&self.config, result)
    }
}
