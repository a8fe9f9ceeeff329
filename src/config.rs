//! Threshold configuration for rally detection
//!
//! Every tunable number used by the analyzers, the state machine, fusion and
//! scoring lives in one flat [`ThresholdConfig`]. It is loaded and validated
//! once per run and then shared read-only (behind an `Arc`) by every
//! concurrent task. Files are flat camelCase JSON documents; loading decodes
//! every field so a load → save → load cycle is lossless.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{log_config_error, ConfigError};

/// Allowed deviation of a weight group from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Complete set of detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdConfig {
    // Audio analysis
    /// FFT window size in samples (power of two)
    pub fft_window_size: usize,
    /// Hop between analysis windows in samples
    pub audio_hop_size: usize,
    /// Lower edge of the ball-strike band (Hz)
    pub hit_frequency_min: f64,
    /// Upper edge of the ball-strike band (Hz)
    pub hit_frequency_max: f64,
    /// Minimum normalized window amplitude for a peak candidate
    pub audio_amplitude_threshold: f64,
    /// Minimum peak confidence for a hit sound
    pub hit_confidence_threshold: f64,
    /// Peaks closer than this (seconds) collapse into the strongest one
    pub min_hit_interval: f64,

    // Movement analysis
    /// Frames sampled per second of video
    pub video_analysis_fps: f64,
    /// Pose confidence below which a frame is flagged low-confidence
    pub pose_confidence_threshold: f64,
    /// Wrist speed (frame widths per second) that counts as a full swing
    pub wrist_velocity_threshold: f64,
    /// Torso speed (frame widths per second) that counts as full footwork
    pub body_displacement_scale: f64,
    /// Movement intensity at which a frame counts as active play
    pub movement_intensity_threshold: f64,

    // Temporal segmentation
    /// Consecutive active frames needed to confirm a rally onset
    pub rally_start_frame_count: u32,
    /// Seconds prepended to a rally start
    pub rally_start_padding: f64,
    /// Seconds appended after the last activity
    pub rally_end_padding: f64,
    /// Inactivity (seconds) that finalizes a rally
    pub min_pause_duration_to_end: f64,
    /// Pauses shorter than this (seconds) may resume the rally
    pub max_pause_duration: f64,
    /// Shortest accepted rally (seconds)
    pub min_rally_duration: f64,
    /// Longest accepted rally (seconds)
    pub max_rally_duration: f64,

    // Feature fusion
    pub video_weight: f64,
    pub audio_weight: f64,
    pub temporal_weight: f64,
    /// Audio latency relative to video (seconds, subtracted from audio timestamps)
    pub audio_video_sync_offset: f64,
    /// Minimum fused confidence for a rally to be accepted
    pub min_combined_confidence: f64,

    // Excitement scoring
    pub duration_weight: f64,
    pub intensity_weight: f64,
    pub hit_frequency_weight: f64,
    pub continuity_weight: f64,
    /// Duration (seconds) at which the duration sub-score saturates
    pub max_scoring_duration: f64,
    /// Hit rate (hits per second) at which the hit sub-score saturates
    pub exciting_hit_rate: f64,
    /// Rallies at least this long (seconds) receive the long-rally bonus
    pub long_rally_bonus_duration: f64,
    pub long_rally_bonus: f64,
    /// Peak intensity at which the high-intensity bonus applies
    pub high_intensity_bonus_threshold: f64,
    pub high_intensity_bonus: f64,
    /// Maximum penalty for a rally accepted with low fusion confidence
    pub low_confidence_penalty: f64,

    // Engine
    pub enable_parallel_processing: bool,
    pub enable_chunking: bool,
    /// Chunk length in seconds for long videos
    pub chunk_duration: f64,
    /// Upper bound on chunks analysed concurrently
    pub max_concurrent_chunks: usize,
    /// Candidates closer than this (seconds) across a chunk boundary are merged
    pub chunk_merge_gap: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            fft_window_size: 2048,
            audio_hop_size: 1024,
            hit_frequency_min: 500.0,
            hit_frequency_max: 4000.0,
            audio_amplitude_threshold: 0.3,
            hit_confidence_threshold: 0.6,
            min_hit_interval: 0.12,

            video_analysis_fps: 5.0,
            pose_confidence_threshold: 0.3,
            wrist_velocity_threshold: 0.6,
            body_displacement_scale: 0.25,
            movement_intensity_threshold: 0.25,

            rally_start_frame_count: 3,
            rally_start_padding: 1.0,
            rally_end_padding: 1.0,
            min_pause_duration_to_end: 3.0,
            max_pause_duration: 5.0,
            min_rally_duration: 3.0,
            max_rally_duration: 120.0,

            video_weight: 0.5,
            audio_weight: 0.3,
            temporal_weight: 0.2,
            audio_video_sync_offset: 0.0,
            min_combined_confidence: 0.6,

            duration_weight: 0.25,
            intensity_weight: 0.3,
            hit_frequency_weight: 0.25,
            continuity_weight: 0.2,
            max_scoring_duration: 30.0,
            exciting_hit_rate: 1.2,
            long_rally_bonus_duration: 20.0,
            long_rally_bonus: 5.0,
            high_intensity_bonus_threshold: 0.8,
            high_intensity_bonus: 5.0,
            low_confidence_penalty: 10.0,

            enable_parallel_processing: true,
            enable_chunking: true,
            chunk_duration: 300.0,
            max_concurrent_chunks: 2,
            chunk_merge_gap: 0.5,
        }
    }
}

impl ThresholdConfig {
    /// Parse a config document and validate it
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: ThresholdConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate configuration from a JSON file
    ///
    /// Unlike a best-effort settings loader this never falls back to
    /// defaults: a missing file, a malformed document or an invalid value
    /// is returned to the caller before any analysis runs.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            details: err.to_string(),
        })?;

        match Self::from_json(&contents) {
            Ok(config) => {
                tracing::info!("[Config] Loaded threshold configuration from {:?}", path);
                Ok(config)
            }
            Err(err) => {
                log_config_error(&err, &path.display().to_string());
                Err(err)
            }
        }
    }

    /// Validate then write configuration as pretty JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            details: err.to_string(),
        })?;
        tracing::debug!("[Config] Saved threshold configuration to {:?}", path);
        Ok(())
    }

    /// Sum of the fusion weights (video + audio + temporal)
    pub fn fusion_weight_sum(&self) -> f64 {
        self.video_weight + self.audio_weight + self.temporal_weight
    }

    /// Sum of the scoring sub-score weights
    pub fn scoring_weight_sum(&self) -> f64 {
        self.duration_weight
            + self.intensity_weight
            + self.hit_frequency_weight
            + self.continuity_weight
    }

    /// Duration of one sampled video frame in seconds
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.video_analysis_fps
    }

    /// Check every range and relation, failing on the first violation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_window_size < 64 || !self.fft_window_size.is_power_of_two() {
            return Err(out_of_range(
                "fftWindowSize",
                self.fft_window_size as f64,
                "power of two ≥ 64",
            ));
        }
        if self.audio_hop_size == 0 {
            return Err(out_of_range("audioHopSize", 0.0, "> 0"));
        }
        if self.audio_hop_size > self.fft_window_size {
            return Err(ConfigError::InvalidRelation {
                parameter: "audioHopSize".to_string(),
                details: format!(
                    "hop {} must not exceed fftWindowSize {}",
                    self.audio_hop_size, self.fft_window_size
                ),
            });
        }
        positive("hitFrequencyMin", self.hit_frequency_min)?;
        positive("hitFrequencyMax", self.hit_frequency_max)?;
        if self.hit_frequency_min >= self.hit_frequency_max {
            return Err(ConfigError::InvalidRelation {
                parameter: "hitFrequencyMin".to_string(),
                details: format!(
                    "band lower edge {} must be below upper edge {}",
                    self.hit_frequency_min, self.hit_frequency_max
                ),
            });
        }
        unit_interval("audioAmplitudeThreshold", self.audio_amplitude_threshold)?;
        unit_interval("hitConfidenceThreshold", self.hit_confidence_threshold)?;
        non_negative("minHitInterval", self.min_hit_interval)?;

        positive("videoAnalysisFps", self.video_analysis_fps)?;
        if self.video_analysis_fps > 120.0 {
            return Err(out_of_range(
                "videoAnalysisFps",
                self.video_analysis_fps,
                "(0, 120]",
            ));
        }
        unit_interval("poseConfidenceThreshold", self.pose_confidence_threshold)?;
        positive("wristVelocityThreshold", self.wrist_velocity_threshold)?;
        positive("bodyDisplacementScale", self.body_displacement_scale)?;
        unit_interval(
            "movementIntensityThreshold",
            self.movement_intensity_threshold,
        )?;

        if self.rally_start_frame_count == 0 {
            return Err(out_of_range("rallyStartFrameCount", 0.0, "≥ 1"));
        }
        non_negative("rallyStartPadding", self.rally_start_padding)?;
        non_negative("rallyEndPadding", self.rally_end_padding)?;
        positive("minPauseDurationToEnd", self.min_pause_duration_to_end)?;
        positive("maxPauseDuration", self.max_pause_duration)?;
        if self.max_pause_duration < self.min_pause_duration_to_end {
            return Err(ConfigError::InvalidRelation {
                parameter: "maxPauseDuration".to_string(),
                details: format!(
                    "{} must be ≥ minPauseDurationToEnd {}",
                    self.max_pause_duration, self.min_pause_duration_to_end
                ),
            });
        }
        positive("minRallyDuration", self.min_rally_duration)?;
        if self.max_rally_duration <= self.min_rally_duration {
            return Err(ConfigError::InvalidRelation {
                parameter: "maxRallyDuration".to_string(),
                details: format!(
                    "{} must exceed minRallyDuration {}",
                    self.max_rally_duration, self.min_rally_duration
                ),
            });
        }

        unit_interval("videoWeight", self.video_weight)?;
        unit_interval("audioWeight", self.audio_weight)?;
        unit_interval("temporalWeight", self.temporal_weight)?;
        weight_sum("fusion", self.fusion_weight_sum())?;
        finite("audioVideoSyncOffset", self.audio_video_sync_offset)?;
        if self.audio_video_sync_offset.abs() > 5.0 {
            return Err(out_of_range(
                "audioVideoSyncOffset",
                self.audio_video_sync_offset,
                "[-5, 5] seconds",
            ));
        }
        unit_interval("minCombinedConfidence", self.min_combined_confidence)?;

        unit_interval("durationWeight", self.duration_weight)?;
        unit_interval("intensityWeight", self.intensity_weight)?;
        unit_interval("hitFrequencyWeight", self.hit_frequency_weight)?;
        unit_interval("continuityWeight", self.continuity_weight)?;
        weight_sum("scoring", self.scoring_weight_sum())?;
        positive("maxScoringDuration", self.max_scoring_duration)?;
        positive("excitingHitRate", self.exciting_hit_rate)?;
        non_negative("longRallyBonusDuration", self.long_rally_bonus_duration)?;
        score_points("longRallyBonus", self.long_rally_bonus)?;
        unit_interval(
            "highIntensityBonusThreshold",
            self.high_intensity_bonus_threshold,
        )?;
        score_points("highIntensityBonus", self.high_intensity_bonus)?;
        score_points("lowConfidencePenalty", self.low_confidence_penalty)?;

        positive("chunkDuration", self.chunk_duration)?;
        if self.chunk_duration < self.max_rally_duration {
            return Err(ConfigError::InvalidRelation {
                parameter: "chunkDuration".to_string(),
                details: format!(
                    "{} must be ≥ maxRallyDuration {} so a rally spans at most one boundary",
                    self.chunk_duration, self.max_rally_duration
                ),
            });
        }
        if self.max_concurrent_chunks == 0 {
            return Err(out_of_range("maxConcurrentChunks", 0.0, "≥ 1"));
        }
        non_negative("chunkMergeGap", self.chunk_merge_gap)?;

        Ok(())
    }
}

fn out_of_range(parameter: &str, value: f64, expected: &str) -> ConfigError {
    ConfigError::OutOfRange {
        parameter: parameter.to_string(),
        value,
        expected: expected.to_string(),
    }
}

fn finite(parameter: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(out_of_range(parameter, value, "a finite number"))
    }
}

fn positive(parameter: &str, value: f64) -> Result<(), ConfigError> {
    finite(parameter, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(out_of_range(parameter, value, "> 0"))
    }
}

fn non_negative(parameter: &str, value: f64) -> Result<(), ConfigError> {
    finite(parameter, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(out_of_range(parameter, value, "≥ 0"))
    }
}

fn unit_interval(parameter: &str, value: f64) -> Result<(), ConfigError> {
    finite(parameter, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(out_of_range(parameter, value, "[0, 1]"))
    }
}

fn score_points(parameter: &str, value: f64) -> Result<(), ConfigError> {
    finite(parameter, value)?;
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(out_of_range(parameter, value, "[0, 100]"))
    }
}

fn weight_sum(group: &str, sum: f64) -> Result<(), ConfigError> {
    if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
        Ok(())
    } else {
        Err(ConfigError::WeightSum {
            group: group.to_string(),
            sum,
        })
    }
}
