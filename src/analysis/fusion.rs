// FeatureFusion - per-candidate confidence from video, audio and continuity
//
//   combined = videoWeight    * videoIntensity
//            + audioWeight    * min(hitDensity / excitingHitRate, 1)
//            + temporalWeight * continuity
//
// All three inputs are measured over the candidate's core (first to last
// active instant), not the padded interval, so padding never dilutes them.
// Audio timestamps are shifted by `audioVideoSyncOffset` before anything is
// compared against video time.

use serde::Serialize;
use std::sync::Arc;

use crate::analysis::audio::AudioAnalysis;
use crate::analysis::movement::MovementAnalysis;
use crate::analysis::temporal::{ActivitySignal, CandidateInterval};
use crate::config::ThresholdConfig;
use crate::time_range::TimeRange;

/// Share of the video score taken by the peak intensity (rest is the mean)
const PEAK_INTENSITY_WEIGHT: f64 = 0.3;

/// Fused evidence for one candidate interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedFeatures {
    pub time_range: TimeRange,
    /// Normalized movement intensity, [0, 1]
    pub video_intensity: f64,
    pub avg_movement_intensity: f64,
    pub peak_movement_intensity: f64,
    /// Hit sounds per second
    pub audio_hit_density: f64,
    pub hit_count: usize,
    /// Hit density relative to `excitingHitRate`, [0, 1]
    pub normalized_hit_density: f64,
    /// Fraction of active sampled frames, [0, 1]
    pub temporal_continuity: f64,
    pub combined_confidence: f64,
    /// `minCombinedConfidence` the decision was made against
    pub acceptance_threshold: f64,
}

impl FusedFeatures {
    pub fn is_likely_rally(&self) -> bool {
        self.combined_confidence >= self.acceptance_threshold
    }
}

/// Combines analyzer outputs into an accept/reject decision
pub struct FeatureFusion {
    config: Arc<ThresholdConfig>,
}

impl FeatureFusion {
    pub fn new(config: Arc<ThresholdConfig>) -> Self {
        Self { config }
    }

    /// Shift audio timestamps into video time
    ///
    /// A positive offset means the audio lags the picture.
    pub fn align(&self, mut audio: AudioAnalysis) -> AudioAnalysis {
        let offset = self.config.audio_video_sync_offset;
        if offset != 0.0 {
            for peak in &mut audio.peaks {
                peak.timestamp -= offset;
            }
            audio.range = TimeRange::new(audio.range.start - offset, audio.range.end - offset);
        }
        audio
    }

    /// Fuse the evidence for `candidate`
    ///
    /// `audio` must already be aligned; `None` means no audio track.
    pub fn fuse(
        &self,
        candidate: &CandidateInterval,
        movement: &MovementAnalysis,
        audio: Option<&AudioAnalysis>,
        signals: &[ActivitySignal],
    ) -> FusedFeatures {
        let core = candidate.core(self.config.frame_interval());

        let avg_movement_intensity = movement.average_intensity(core);
        let peak_movement_intensity = movement.peak_intensity(core);
        let video_intensity = ((1.0 - PEAK_INTENSITY_WEIGHT) * avg_movement_intensity
            + PEAK_INTENSITY_WEIGHT * peak_movement_intensity)
            .clamp(0.0, 1.0);

        let (hit_count, audio_hit_density) = match audio {
            Some(analysis) => (
                analysis.hit_sounds(core).len(),
                analysis.hit_density(core),
            ),
            None => (0, 0.0),
        };
        let normalized_hit_density =
            (audio_hit_density / self.config.exciting_hit_rate).clamp(0.0, 1.0);

        let (active, total) = signals
            .iter()
            .filter(|signal| core.contains(signal.timestamp))
            .fold((0usize, 0usize), |(active, total), signal| {
                (active + signal.active as usize, total + 1)
            });
        let temporal_continuity = if total == 0 {
            0.0
        } else {
            active as f64 / total as f64
        };

        let combined_confidence = (self.config.video_weight * video_intensity
            + self.config.audio_weight * normalized_hit_density
            + self.config.temporal_weight * temporal_continuity)
            .clamp(0.0, 1.0);

        FusedFeatures {
            time_range: candidate.range,
            video_intensity,
            avg_movement_intensity,
            peak_movement_intensity,
            audio_hit_density,
            hit_count,
            normalized_hit_density,
            temporal_continuity,
            combined_confidence,
            acceptance_threshold: self.config.min_combined_confidence,
        }
    }
}
