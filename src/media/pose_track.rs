//! Pre-computed pose tracks.
//!
//! Pose estimation is an external capability. A [`PoseTrack`] is the JSON
//! output of such an estimator run over a whole recording: one entry per
//! decoded frame with every person's keypoints. It serves as both the
//! video-frame provider (timestamps only, no pixels) and the pose estimator.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::MediaError;
use crate::media::{PoseEstimator, PoseObservation, VideoFrame, VideoFrameProvider};

/// Keypoints for every person in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseTrackFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub people: Vec<PoseObservation>,
}

/// Pose estimator output for a full recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseTrack {
    pub duration: f64,
    pub frame_rate: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub frames: Vec<PoseTrackFrame>,
}

impl PoseTrack {
    /// Load a pose track from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| MediaError::Unreadable {
            details: format!("failed to read pose track {}: {err}", path.display()),
        })?;
        let track = Self::from_json(&contents)?;
        tracing::info!(
            "[PoseTrack] Loaded {} frames ({:.1}s) from {:?}",
            track.frames.len(),
            track.duration,
            path
        );
        Ok(track)
    }

    /// Parse a pose track; frames are sorted by timestamp
    pub fn from_json(data: &str) -> Result<Self, MediaError> {
        let mut track: PoseTrack =
            serde_json::from_str(data).map_err(|err| MediaError::Unreadable {
                details: format!("invalid pose track: {err}"),
            })?;
        if track.frames.is_empty() || track.duration <= 0.0 {
            return Err(MediaError::VideoTrackMissing);
        }
        track
            .frames
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Ok(track)
    }

    /// Index of the frame displayed at `timestamp`
    fn frame_index(&self, timestamp: f64) -> usize {
        let next = self
            .frames
            .partition_point(|frame| frame.timestamp <= timestamp);
        next.saturating_sub(1)
    }

    /// Nearest frame within half a native frame interval
    fn frame_near(&self, timestamp: f64) -> Option<&PoseTrackFrame> {
        let half_interval = 0.5 / self.frame_rate.max(1.0);
        let next = self
            .frames
            .partition_point(|frame| frame.timestamp < timestamp);
        [next.checked_sub(1), Some(next)]
            .into_iter()
            .flatten()
            .filter_map(|idx| self.frames.get(idx))
            .filter(|frame| (frame.timestamp - timestamp).abs() <= half_interval + 1e-9)
            .min_by(|a, b| {
                (a.timestamp - timestamp)
                    .abs()
                    .total_cmp(&(b.timestamp - timestamp).abs())
            })
    }
}

impl VideoFrameProvider for PoseTrack {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_at(&self, timestamp: f64) -> Result<VideoFrame, MediaError> {
        if timestamp < 0.0 || timestamp > self.duration {
            return Err(MediaError::DecodeFailed {
                timestamp,
                details: "timestamp outside pose track".to_string(),
            });
        }
        let frame = &self.frames[self.frame_index(timestamp)];
        Ok(VideoFrame {
            timestamp: frame.timestamp,
            width: self.width,
            height: self.height,
            luma: Arc::from(Vec::<u8>::new()),
        })
    }
}

impl PoseEstimator for PoseTrack {
    fn estimate(&self, frame: &VideoFrame) -> Result<Vec<PoseObservation>, MediaError> {
        Ok(self
            .frame_near(frame.timestamp)
            .map(|entry| entry.people.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = r#"{
        "duration": 1.0,
        "frameRate": 5.0,
        "width": 1920,
        "height": 1080,
        "frames": [
            { "timestamp": 0.4, "people": [] },
            { "timestamp": 0.0, "people": [
                { "confidence": 0.9, "keypoints": {
                    "left_wrist": { "x": 0.4, "y": 0.5, "confidence": 0.8 }
                } }
            ] },
            { "timestamp": 0.2 }
        ]
    }"#;

    #[test]
    fn test_frames_sorted_on_load() {
        let track = PoseTrack::from_json(TRACK).unwrap();
        let timestamps: Vec<f64> = track.frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![0.0, 0.2, 0.4]);
    }

    #[test]
    fn test_frame_at_snaps_to_displayed_frame() {
        let track = PoseTrack::from_json(TRACK).unwrap();
        let frame = track.frame_at(0.3).unwrap();
        assert_eq!(frame.timestamp, 0.2);
        assert!(track.frame_at(2.0).is_err());
    }

    #[test]
    fn test_estimate_returns_people_for_frame() {
        let track = PoseTrack::from_json(TRACK).unwrap();
        let frame = track.frame_at(0.0).unwrap();
        let people = track.estimate(&frame).unwrap();
        assert_eq!(people.len(), 1);
        assert!(people[0]
            .keypoint(crate::media::Joint::LeftWrist)
            .is_some());

        let empty = track.estimate(&track.frame_at(0.4).unwrap()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_empty_track_is_missing_video() {
        let err = PoseTrack::from_json(r#"{ "duration": 0.0, "frameRate": 30.0, "frames": [] }"#)
            .unwrap_err();
        assert_eq!(err, MediaError::VideoTrackMissing);
    }
}
