// Detection result types
//
// A run owns its rallies outright; the only link back to the source is the
// video identifier string. Rallies are stored chronologically, ranking views
// are computed on demand.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::temporal::DurationRejection;
use crate::time_range::{TimeRange, TimeSpan};

/// Measured attributes of an accepted rally
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RallyMeasurements {
    /// Fusion confidence that accepted the rally, [0, 1]
    pub detection_confidence: f64,
    pub avg_movement_intensity: f64,
    pub peak_movement_intensity: f64,
    pub hit_count: usize,
    /// Hit sounds per second
    pub hit_density: f64,
    /// Fraction of active sampled frames, [0, 1]
    pub continuity: f64,
}

/// Accepted rally interval
///
/// `end_time > start_time` always holds. The excitement score starts at 0 and
/// is only written by [`crate::analysis::scoring::ExcitementScorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RallyRecord")]
pub struct DetectedRally {
    id: Uuid,
    start_time: f64,
    end_time: f64,
    #[serde(flatten)]
    measurements: RallyMeasurements,
    excitement_score: f64,
}

/// Unchecked wire form of [`DetectedRally`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RallyRecord {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    start_time: f64,
    end_time: f64,
    #[serde(flatten)]
    measurements: RallyMeasurements,
    #[serde(default)]
    excitement_score: f64,
}

impl TryFrom<RallyRecord> for DetectedRally {
    type Error = String;

    fn try_from(record: RallyRecord) -> Result<Self, Self::Error> {
        let mut rally = DetectedRally::new(record.start_time, record.end_time, record.measurements)
            .ok_or_else(|| {
                format!(
                    "rally {} has endTime {} not after startTime {}",
                    record.id, record.end_time, record.start_time
                )
            })?;
        if !(0.0..=100.0).contains(&record.excitement_score) {
            return Err(format!(
                "rally {} has excitementScore {} outside [0, 100]",
                record.id, record.excitement_score
            ));
        }
        rally.id = record.id;
        rally.excitement_score = record.excitement_score;
        Ok(rally)
    }
}

impl DetectedRally {
    /// New unscored rally; `None` unless `start < end` and both are finite
    pub fn new(start_time: f64, end_time: f64, measurements: RallyMeasurements) -> Option<Self> {
        if !start_time.is_finite() || !end_time.is_finite() || end_time <= start_time {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            start_time,
            end_time,
            measurements,
            excitement_score: 0.0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn measurements(&self) -> &RallyMeasurements {
        &self.measurements
    }

    pub fn detection_confidence(&self) -> f64 {
        self.measurements.detection_confidence
    }

    pub fn hit_count(&self) -> usize {
        self.measurements.hit_count
    }

    pub fn excitement_score(&self) -> f64 {
        self.excitement_score
    }

    pub(crate) fn set_excitement_score(&mut self, score: f64) {
        self.excitement_score = score.clamp(0.0, 100.0);
    }
}

impl TimeSpan for DetectedRally {
    fn span(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Why a candidate interval did not become a rally
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    TooShort { duration: f64 },
    TooLong { duration: f64 },
    #[serde(rename_all = "camelCase")]
    LowConfidence {
        combined_confidence: f64,
        threshold: f64,
    },
}

impl RejectionReason {
    pub fn from_duration(rejection: DurationRejection, duration: f64) -> Self {
        match rejection {
            DurationRejection::TooShort => RejectionReason::TooShort { duration },
            DurationRejection::TooLong => RejectionReason::TooLong { duration },
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::TooShort { duration } => {
                write!(f, "too short ({duration:.1}s)")
            }
            RejectionReason::TooLong { duration } => write!(f, "too long ({duration:.1}s)"),
            RejectionReason::LowConfidence {
                combined_confidence,
                threshold,
            } => write!(
                f,
                "low confidence ({combined_confidence:.2} < {threshold:.2})"
            ),
        }
    }
}

/// Candidate interval dropped before becoming a rally
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedCandidate {
    pub range: TimeRange,
    #[serde(flatten)]
    pub reason: RejectionReason,
}

/// Counters collected during a run, for tuning thresholds
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionDiagnostics {
    pub chunk_count: usize,
    pub frames_analysed: usize,
    pub low_confidence_frames: usize,
    pub frames_without_person: usize,
    pub audio_windows: usize,
    pub audio_peaks: usize,
    pub hit_sounds: usize,
    /// Candidates emitted by segmentation across all chunks
    pub raw_candidates: usize,
    /// Candidates left after cross-chunk merging
    pub merged_candidates: usize,
    pub rejected: Vec<RejectedCandidate>,
    pub audio_seconds: f64,
    pub movement_seconds: f64,
}

/// Output of one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RallyDetectionResult {
    pub video_id: String,
    pub video_duration: f64,
    /// Accepted rallies in chronological order
    pub rallies: Vec<DetectedRally>,
    /// Wall-clock seconds for the whole run
    pub processing_time: f64,
    /// False when detection ran on movement alone
    pub audio_available: bool,
    #[serde(default)]
    pub diagnostics: DetectionDiagnostics,
}

/// Compact summary for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub video_id: String,
    pub rally_count: usize,
    pub average_duration: f64,
    pub longest_duration: f64,
    pub total_rally_time: f64,
    pub top_score: f64,
    pub processing_time: f64,
    pub audio_available: bool,
}

impl RallyDetectionResult {
    pub fn count(&self) -> usize {
        self.rallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rallies.is_empty()
    }

    /// Mean rally duration; 0 with no rallies
    pub fn average_duration(&self) -> f64 {
        if self.rallies.is_empty() {
            0.0
        } else {
            self.total_rally_time() / self.rallies.len() as f64
        }
    }

    pub fn total_rally_time(&self) -> f64 {
        self.rallies.iter().map(DetectedRally::duration).sum()
    }

    pub fn longest(&self) -> Option<&DetectedRally> {
        self.rallies
            .iter()
            .max_by(|a, b| a.duration().total_cmp(&b.duration()))
    }

    pub fn top_scoring(&self) -> Option<&DetectedRally> {
        self.ranked().into_iter().next()
    }

    /// Rallies by descending score, earlier rally first on ties
    pub fn ranked(&self) -> Vec<&DetectedRally> {
        let mut ranked: Vec<&DetectedRally> = self.rallies.iter().collect();
        ranked.sort_by(|a, b| {
            b.excitement_score()
                .total_cmp(&a.excitement_score())
                .then(a.start_time().total_cmp(&b.start_time()))
        });
        ranked
    }

    pub fn top_n(&self, n: usize) -> Vec<&DetectedRally> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    /// Rallies scoring at least `score`, chronological
    pub fn rallies_above(&self, score: f64) -> Vec<&DetectedRally> {
        self.rallies
            .iter()
            .filter(|rally| rally.excitement_score() >= score)
            .collect()
    }

    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary {
            video_id: self.video_id.clone(),
            rally_count: self.count(),
            average_duration: self.average_duration(),
            longest_duration: self.longest().map(DetectedRally::duration).unwrap_or(0.0),
            total_rally_time: self.total_rally_time(),
            top_score: self
                .top_scoring()
                .map(DetectedRally::excitement_score)
                .unwrap_or(0.0),
            processing_time: self.processing_time,
            audio_available: self.audio_available,
        }
    }
}
