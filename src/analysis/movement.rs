// MovementAnalyzer - per-frame player movement intensity
//
// Frames are sampled on a global grid (k / videoAnalysisFps) so that chunked
// and single-pass runs look at exactly the same instants. For every sampled
// frame the pose estimator reports the people in view; each person is paired
// with the nearest body centre from the previous sampled frame and scored from
// wrist speed and body displacement (frame-widths per second). The frame's
// intensity is the most active player's. When nobody is detected the luma
// difference between consecutive frames stands in as a coarse motion measure.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ThresholdConfig;
use crate::engine::CancellationToken;
use crate::error::MediaError;
use crate::media::{Joint, Keypoint, PoseEstimator, PoseObservation, VideoFrame, VideoFrameProvider};
use crate::time_range::TimeRange;

/// Share of intensity driven by wrist speed (rest is body displacement)
const WRIST_WEIGHT: f64 = 0.6;

/// Gain applied to mean luma difference when no person is visible
const MOTION_FALLBACK_GAIN: f64 = 8.0;

/// Frames analysed between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 16;

/// Movement measurements for one sampled frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    pub timestamp: f64,
    /// Normalized movement, [0, 1]
    pub movement_intensity: f64,
    pub has_person: bool,
    pub person_count: usize,
    /// Best pose confidence in the frame, [0, 1]
    pub pose_confidence: f64,
    /// Keypoints of the most active person
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<BTreeMap<Joint, Keypoint>>,
    /// Fastest wrist speed in frame-widths per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrist_velocity: Option<f64>,
    /// Body-centre speed in frame-widths per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_displacement: Option<f64>,
    /// Pose confidence fell below `poseConfidenceThreshold`
    pub low_confidence: bool,
}

/// Output of one movement analysis pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementAnalysis {
    /// Ordered by timestamp
    pub frames: Vec<FrameAnalysis>,
    pub fps: f64,
    pub processing_time: f64,
    pub range: TimeRange,
}

impl MovementAnalysis {
    pub fn frames_in(&self, range: TimeRange) -> impl Iterator<Item = &FrameAnalysis> {
        self.frames
            .iter()
            .filter(move |frame| range.contains(frame.timestamp))
    }

    /// Mean movement intensity over `range`; 0 when no frame falls inside
    pub fn average_intensity(&self, range: TimeRange) -> f64 {
        let (sum, count) = self
            .frames_in(range)
            .fold((0.0, 0usize), |(sum, count), frame| {
                (sum + frame.movement_intensity, count + 1)
            });
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn peak_intensity(&self, range: TimeRange) -> f64 {
        self.frames_in(range)
            .map(|frame| frame.movement_intensity)
            .fold(0.0, f64::max)
    }

    /// Share of frames in `range` flagged low-confidence
    pub fn low_confidence_ratio(&self, range: TimeRange) -> f64 {
        let (low, count) = self
            .frames_in(range)
            .fold((0usize, 0usize), |(low, count), frame| {
                (low + frame.low_confidence as usize, count + 1)
            });
        if count == 0 {
            0.0
        } else {
            low as f64 / count as f64
        }
    }

    /// Join per-chunk analyses (given in chronological order)
    pub fn concat(parts: Vec<MovementAnalysis>, range: TimeRange, fps: f64) -> Self {
        let mut merged = MovementAnalysis {
            frames: Vec::new(),
            fps,
            processing_time: 0.0,
            range,
        };
        for part in parts {
            merged.processing_time += part.processing_time;
            merged.frames.extend(part.frames);
        }
        merged
            .frames
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        merged
    }
}

/// Measured motion of one person between two sampled frames
#[derive(Debug, Clone, Copy)]
struct PersonMotion {
    wrist_velocity: Option<f64>,
    body_displacement: Option<f64>,
    intensity: f64,
}

/// Samples frames and scores player movement
pub struct MovementAnalyzer {
    config: Arc<ThresholdConfig>,
}

impl MovementAnalyzer {
    pub fn new(config: Arc<ThresholdConfig>) -> Self {
        Self { config }
    }

    /// Sample timestamps inside `range` on the global analysis grid
    pub fn sample_times(&self, range: TimeRange) -> Vec<f64> {
        let fps = self.config.video_analysis_fps;
        let first = (range.start * fps - 1e-9).ceil().max(0.0) as u64;
        (first..)
            .map(|k| k as f64 / fps)
            .take_while(|t| *t < range.end)
            .collect()
    }

    /// Analyze the sampled frames inside `range`
    pub fn analyze(
        &self,
        video: &dyn VideoFrameProvider,
        pose: &dyn PoseEstimator,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> Result<MovementAnalysis, MediaError> {
        cancel.check()?;
        let started = Instant::now();
        let interval = self.config.frame_interval();
        let times = self.sample_times(range);

        // Reference frame just before the range so its first frame has a predecessor.
        let mut previous: Option<(VideoFrame, Vec<PoseObservation>)> = match times.first() {
            Some(&first) if first - interval >= -1e-9 => {
                let frame = video.frame_at((first - interval).max(0.0))?;
                let people = pose.estimate(&frame)?;
                Some((frame, people))
            }
            _ => None,
        };

        let mut frames = Vec::with_capacity(times.len());
        for (index, &timestamp) in times.iter().enumerate() {
            if index % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }
            let frame = video.frame_at(timestamp)?;
            let people = pose.estimate(&frame)?;
            let analysis = self.analyze_frame(timestamp, &frame, &people, previous.as_ref());
            frames.push(analysis);
            previous = Some((frame, people));
        }

        let processing_time = started.elapsed().as_secs_f64();
        tracing::debug!(
            "[MovementAnalyzer] {:.1}-{:.1}s: {} frames in {:.3}s",
            range.start,
            range.end,
            frames.len(),
            processing_time
        );

        Ok(MovementAnalysis {
            frames,
            fps: self.config.video_analysis_fps,
            processing_time,
            range,
        })
    }

    fn analyze_frame(
        &self,
        timestamp: f64,
        frame: &VideoFrame,
        people: &[PoseObservation],
        previous: Option<&(VideoFrame, Vec<PoseObservation>)>,
    ) -> FrameAnalysis {
        let pose_confidence = people
            .iter()
            .map(|person| person.confidence)
            .fold(0.0, f64::max)
            .clamp(0.0, 1.0);
        let low_confidence = pose_confidence < self.config.pose_confidence_threshold;

        let elapsed = previous
            .map(|(prev_frame, _)| frame.timestamp - prev_frame.timestamp)
            .filter(|dt| *dt > 1e-6)
            .unwrap_or_else(|| self.config.frame_interval());

        let mut best: Option<(usize, PersonMotion)> = None;
        if let Some((_, prev_people)) = previous {
            for (index, person) in people.iter().enumerate() {
                let Some(matched) = nearest_person(person, prev_people) else {
                    continue;
                };
                let motion = self.person_motion(matched, person, elapsed);
                if best.map_or(true, |(_, b)| motion.intensity > b.intensity) {
                    best = Some((index, motion));
                }
            }
        }

        let movement_intensity = match (&best, previous) {
            (Some((_, motion)), _) => motion.intensity,
            (None, Some((prev_frame, _))) if people.is_empty() => prev_frame
                .mean_abs_difference(frame)
                .map(|diff| (diff * MOTION_FALLBACK_GAIN).min(1.0))
                .unwrap_or(0.0),
            _ => 0.0,
        };

        let active_person = best
            .map(|(index, _)| index)
            .or_else(|| (!people.is_empty()).then_some(0));

        FrameAnalysis {
            timestamp,
            movement_intensity: movement_intensity.clamp(0.0, 1.0),
            has_person: !people.is_empty(),
            person_count: people.len(),
            pose_confidence,
            keypoints: active_person
                .and_then(|index| people.get(index))
                .map(|person| person.keypoints.clone()),
            wrist_velocity: best.and_then(|(_, motion)| motion.wrist_velocity),
            body_displacement: best.and_then(|(_, motion)| motion.body_displacement),
            low_confidence,
        }
    }

    fn person_motion(
        &self,
        before: &PoseObservation,
        after: &PoseObservation,
        elapsed: f64,
    ) -> PersonMotion {
        let speed = |joint: Joint| -> Option<f64> {
            let a = before.keypoint(joint)?;
            let b = after.keypoint(joint)?;
            Some(a.distance_to(b) / elapsed)
        };

        let wrist_velocity = [speed(Joint::LeftWrist), speed(Joint::RightWrist)]
            .into_iter()
            .flatten()
            .reduce(f64::max);
        let body_displacement = match (before.body_center(), after.body_center()) {
            (Some(a), Some(b)) => Some(a.distance_to(&b) / elapsed),
            _ => None,
        };

        let wrist_score = wrist_velocity
            .map(|v| (v / self.config.wrist_velocity_threshold).min(1.0))
            .unwrap_or(0.0);
        let body_score = body_displacement
            .map(|v| (v / self.config.body_displacement_scale).min(1.0))
            .unwrap_or(0.0);

        let intensity = match (wrist_velocity, body_displacement) {
            (Some(_), Some(_)) => WRIST_WEIGHT * wrist_score + (1.0 - WRIST_WEIGHT) * body_score,
            (Some(_), None) => wrist_score,
            (None, Some(_)) => body_score,
            (None, None) => 0.0,
        };

        PersonMotion {
            wrist_velocity,
            body_displacement,
            intensity,
        }
    }
}

/// Person in `candidates` whose body centre is closest to `person`'s
fn nearest_person<'a>(
    person: &PoseObservation,
    candidates: &'a [PoseObservation],
) -> Option<&'a PoseObservation> {
    let center = person.body_center()?;
    candidates
        .iter()
        .filter_map(|candidate| {
            candidate
                .body_center()
                .map(|c| (candidate, c.distance_to(&center)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{SyntheticMatch, SyntheticRally};

    fn analyzer() -> MovementAnalyzer {
        MovementAnalyzer::new(Arc::new(ThresholdConfig::default()))
    }

    #[test]
    fn test_sample_times_follow_global_grid() {
        let times = analyzer().sample_times(TimeRange::new(0.3, 1.3));
        assert_eq!(times.len(), 5);
        assert!((times[0] - 0.4).abs() < 1e-9);
        assert!((times[4] - 1.2).abs() < 1e-9);

        let whole = analyzer().sample_times(TimeRange::new(0.0, 1.0));
        assert_eq!(whole.len(), 5);
        assert_eq!(whole[0], 0.0);
    }

    #[test]
    fn test_rally_frames_are_more_intense() {
        let session = SyntheticMatch::new(20.0, vec![SyntheticRally::new(5.0, 15.0)]);
        let video = session.video();
        let analysis = analyzer()
            .analyze(
                &video,
                &video,
                TimeRange::new(0.0, 20.0),
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(analysis.frames.len(), 100);
        let rally = analysis.average_intensity(TimeRange::new(6.0, 14.0));
        let idle = analysis.average_intensity(TimeRange::new(0.0, 4.5));
        assert!(rally > 0.5, "rally intensity {rally}");
        assert!(idle < 0.1, "idle intensity {idle}");
        assert!(analysis.peak_intensity(TimeRange::new(6.0, 14.0)) <= 1.0);
        assert!(analysis.frames.iter().all(|f| f.has_person && f.person_count == 2));
        assert_eq!(analysis.low_confidence_ratio(TimeRange::new(0.0, 20.0)), 0.0);
    }

    #[test]
    fn test_empty_range_queries() {
        let analysis = MovementAnalysis {
            frames: Vec::new(),
            fps: 5.0,
            processing_time: 0.0,
            range: TimeRange::new(0.0, 0.0),
        };
        assert_eq!(analysis.average_intensity(TimeRange::new(0.0, 10.0)), 0.0);
        assert_eq!(analysis.peak_intensity(TimeRange::new(0.0, 10.0)), 0.0);
    }

    #[test]
    fn test_low_confidence_frames_are_kept() {
        let mut config = ThresholdConfig::default();
        config.pose_confidence_threshold = 0.95;
        let analyzer = MovementAnalyzer::new(Arc::new(config));
        let session = SyntheticMatch::new(4.0, vec![SyntheticRally::new(0.0, 4.0)]);
        let video = session.video();
        let analysis = analyzer
            .analyze(&video, &video, TimeRange::new(0.0, 4.0), &CancellationToken::new())
            .unwrap();

        assert_eq!(analysis.frames.len(), 20);
        assert!(analysis.frames.iter().all(|f| f.low_confidence));
        assert_eq!(analysis.low_confidence_ratio(TimeRange::new(0.0, 4.0)), 1.0);
    }

    #[test]
    fn test_luma_fallback_without_people() {
        struct Nobody;
        impl PoseEstimator for Nobody {
            fn estimate(&self, _frame: &VideoFrame) -> Result<Vec<PoseObservation>, MediaError> {
                Ok(Vec::new())
            }
        }

        let session = SyntheticMatch::new(10.0, vec![SyntheticRally::new(2.0, 8.0)]);
        let video = session.video();
        let analysis = analyzer()
            .analyze(&video, &Nobody, TimeRange::new(0.0, 10.0), &CancellationToken::new())
            .unwrap();

        assert!(analysis.frames.iter().all(|f| !f.has_person));
        assert!(analysis.peak_intensity(TimeRange::new(2.0, 8.0)) > 0.0);
        assert_eq!(analysis.peak_intensity(TimeRange::new(0.0, 1.8)), 0.0);
    }

    #[test]
    fn test_cancelled_before_first_frame() {
        let session = SyntheticMatch::new(4.0, Vec::new());
        let video = session.video();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = analyzer().analyze(&video, &video, TimeRange::new(0.0, 4.0), &cancel);
        assert_eq!(result, Err(MediaError::Cancelled));
    }
}
