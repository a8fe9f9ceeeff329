//! Decoded-media seams consumed by the analyzers.
//!
//! The detection core never touches containers or codecs. It reads decoded
//! audio through [`AudioSampleProvider`], decoded frames through
//! [`VideoFrameProvider`] and body keypoints through [`PoseEstimator`]. All
//! three are `Send + Sync` so audio and movement analysis (and independent
//! chunks) can read the same source concurrently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::MediaError;
use crate::time_range::TimeRange;

pub mod pose_track;
pub mod synthetic;
pub mod wav;

pub use pose_track::PoseTrack;
pub use synthetic::{SyntheticMatch, SyntheticRally};
pub use wav::WavAudioProvider;

/// Block of decoded PCM samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Timestamp of the first sample frame (seconds)
    pub start_time: f64,
}

impl AudioBuffer {
    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels {
            0 => Vec::new(),
            1 => self.samples.clone(),
            channels => self
                .samples
                .chunks(channels as usize)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect(),
        }
    }
}

/// Source of decoded audio for one video
pub trait AudioSampleProvider: Send + Sync {
    fn sample_rate(&self) -> u32;

    fn channel_count(&self) -> u16;

    /// Track length in seconds
    fn duration(&self) -> f64;

    /// Decoded samples covering `range` (clipped to the track)
    ///
    /// Returns [`MediaError::AudioTrackMissing`] when the source carries no
    /// audio at all.
    fn read(&self, range: TimeRange) -> Result<AudioBuffer, MediaError>;
}

/// Single decoded video frame, reduced to its luma plane
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Row-major 8-bit luma, `width * height` bytes (may be empty when the
    /// provider only carries timestamps)
    pub luma: Arc<[u8]>,
}

impl VideoFrame {
    /// Mean absolute luma difference in [0, 1], `None` when the planes are
    /// missing or differ in size
    pub fn mean_abs_difference(&self, other: &VideoFrame) -> Option<f64> {
        if self.luma.is_empty() || self.luma.len() != other.luma.len() {
            return None;
        }
        let total: u64 = self
            .luma
            .iter()
            .zip(other.luma.iter())
            .map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs() as u64)
            .sum();
        Some(total as f64 / (self.luma.len() as f64 * 255.0))
    }
}

/// Source of decoded video frames for one video
pub trait VideoFrameProvider: Send + Sync {
    /// Video length in seconds
    fn duration(&self) -> f64;

    /// Native frame rate of the track
    fn frame_rate(&self) -> f64;

    /// Decode the frame displayed at `timestamp`
    fn frame_at(&self, timestamp: f64) -> Result<VideoFrame, MediaError>;
}

/// Named body keypoints reported by pose estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

/// 2D keypoint in normalized frame coordinates (0..1 on both axes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl Keypoint {
    pub fn distance_to(&self, other: &Keypoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One detected person in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseObservation {
    pub confidence: f64,
    pub keypoints: BTreeMap<Joint, Keypoint>,
}

impl PoseObservation {
    pub fn keypoint(&self, joint: Joint) -> Option<&Keypoint> {
        self.keypoints.get(&joint)
    }

    /// Body centre: hip midpoint, falling back to shoulders
    pub fn body_center(&self) -> Option<Keypoint> {
        midpoint(
            self.keypoint(Joint::LeftHip),
            self.keypoint(Joint::RightHip),
        )
        .or_else(|| {
            midpoint(
                self.keypoint(Joint::LeftShoulder),
                self.keypoint(Joint::RightShoulder),
            )
        })
    }
}

fn midpoint(a: Option<&Keypoint>, b: Option<&Keypoint>) -> Option<Keypoint> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Keypoint {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
            confidence: a.confidence.min(b.confidence),
        }),
        (Some(single), None) | (None, Some(single)) => Some(*single),
        (None, None) => None,
    }
}

/// External human-pose capability
pub trait PoseEstimator: Send + Sync {
    /// All people visible in `frame`
    fn estimate(&self, frame: &VideoFrame) -> Result<Vec<PoseObservation>, MediaError>;
}

/// Everything the engine needs to read from one recorded video
#[derive(Clone)]
pub struct MediaSource {
    /// Lookup key for the video this run belongs to
    pub video_id: String,
    /// `None` when the recording has no audio track
    pub audio: Option<Arc<dyn AudioSampleProvider>>,
    pub video: Arc<dyn VideoFrameProvider>,
    pub pose: Arc<dyn PoseEstimator>,
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSource")
            .field("video_id", &self.video_id)
            .field("has_audio", &self.audio.is_some())
            .field("duration", &self.video.duration())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_averages_channels() {
        let buffer = AudioBuffer {
            sample_rate: 8000,
            channels: 2,
            samples: vec![1.0, 0.0, 0.5, 0.5],
            start_time: 0.0,
        };
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.to_mono(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_luma_difference() {
        let a = VideoFrame {
            timestamp: 0.0,
            width: 2,
            height: 1,
            luma: Arc::from(vec![0u8, 255u8]),
        };
        let b = VideoFrame {
            timestamp: 0.2,
            width: 2,
            height: 1,
            luma: Arc::from(vec![255u8, 255u8]),
        };
        assert_eq!(a.mean_abs_difference(&b), Some(0.5));

        let empty = VideoFrame {
            luma: Arc::from(Vec::<u8>::new()),
            ..a.clone()
        };
        assert_eq!(empty.mean_abs_difference(&a), None);
    }

    #[test]
    fn test_body_center_falls_back_to_shoulders() {
        let mut keypoints = BTreeMap::new();
        keypoints.insert(
            Joint::LeftShoulder,
            Keypoint {
                x: 0.4,
                y: 0.2,
                confidence: 0.9,
            },
        );
        keypoints.insert(
            Joint::RightShoulder,
            Keypoint {
                x: 0.6,
                y: 0.2,
                confidence: 0.7,
            },
        );
        let pose = PoseObservation {
            confidence: 0.8,
            keypoints,
        };
        let center = pose.body_center().unwrap();
        assert!((center.x - 0.5).abs() < 1e-9);
        assert_eq!(center.confidence, 0.7);
    }
}
