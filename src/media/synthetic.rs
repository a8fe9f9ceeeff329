//! Deterministic synthetic tennis sessions.
//!
//! Renders a scripted match (rally intervals, hit cadence, movement
//! intensity) into an audio track, a low-resolution luma video and a pose
//! estimator that reports two players. Used by the CLI `simulate` command and
//! by the pipeline tests; everything is seeded, so two renders of the same
//! match are identical.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;

use crate::error::MediaError;
use crate::evaluation::{GroundTruthData, GroundTruthRally};
use crate::media::pose_track::{PoseTrack, PoseTrackFrame};
use crate::media::{
    Joint, Keypoint, MediaSource, PoseEstimator, PoseObservation, VideoFrame, VideoFrameProvider,
    WavAudioProvider,
};

/// Default render rate; plenty for a 500-4000 Hz strike band
pub const SYNTHETIC_SAMPLE_RATE: u32 = 22_050;

const FRAME_WIDTH: u32 = 32;
const FRAME_HEIGHT: u32 = 18;
const SWING_PERIOD: f64 = 1.2;
const FOOTWORK_PERIOD: f64 = 2.0;
const IDLE_AMPLITUDE: f64 = 0.004;
const STRIKE_TONE_HZ: f64 = 1_800.0;
const STRIKE_OVERTONE_HZ: f64 = 3_000.0;
const STRIKE_LENGTH: f64 = 0.04;

/// One scripted rally
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticRally {
    pub start: f64,
    pub end: f64,
    /// Seconds between ball strikes
    pub hit_interval: f64,
    /// Movement scale, 1.0 = typical baseline rally
    pub intensity: f64,
}

impl SyntheticRally {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            hit_interval: 1.2,
            intensity: 1.0,
        }
    }

    pub fn with_hit_interval(mut self, hit_interval: f64) -> Self {
        self.hit_interval = hit_interval;
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Scripted match that can be rendered into media providers
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMatch {
    pub video_id: String,
    pub duration: f64,
    pub rallies: Vec<SyntheticRally>,
    pub sample_rate: u32,
    /// Peak amplitude of the uniform court noise
    pub noise_level: f32,
    /// Native frame rate of the rendered video
    pub frame_rate: f64,
    pub seed: u64,
}

impl SyntheticMatch {
    pub fn new(duration: f64, rallies: Vec<SyntheticRally>) -> Self {
        Self {
            video_id: "synthetic-match".to_string(),
            duration,
            rallies,
            sample_rate: SYNTHETIC_SAMPLE_RATE,
            noise_level: 0.02,
            frame_rate: 30.0,
            seed: 0x7E_4A15,
        }
    }

    /// Random but reproducible match layout with `rally_count` rallies
    pub fn generate(seed: u64, rally_count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cursor = rng.gen_range(4.0..8.0);
        let mut rallies = Vec::with_capacity(rally_count);
        for _ in 0..rally_count {
            let length = rng.gen_range(6.0..25.0);
            let rally = SyntheticRally::new(cursor, cursor + length)
                .with_hit_interval(rng.gen_range(0.9..1.5))
                .with_intensity(rng.gen_range(0.6..1.4));
            cursor = rally.end + rng.gen_range(9.0..20.0);
            rallies.push(rally);
        }
        let mut generated = Self::new(cursor + 4.0, rallies);
        generated.seed = seed;
        generated.video_id = format!("synthetic-{seed}");
        generated
    }

    pub fn with_noise(mut self, noise_level: f32) -> Self {
        self.noise_level = noise_level;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Ball strike times across all rallies
    pub fn hit_times(&self) -> Vec<f64> {
        let mut times = Vec::new();
        for rally in &self.rallies {
            let mut t = rally.start;
            while t <= rally.end {
                times.push(t);
                t += rally.hit_interval.max(0.1);
            }
        }
        times
    }

    /// Render the audio track: court noise plus a damped two-tone burst per strike
    pub fn render_audio(&self) -> Vec<f32> {
        let sr = self.sample_rate as f64;
        let total = (self.duration * sr).ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut samples: Vec<f32> = if self.noise_level > 0.0 {
            (0..total)
                .map(|_| rng.gen_range(-self.noise_level..self.noise_level))
                .collect()
        } else {
            vec![0.0; total]
        };

        let strike_len = (STRIKE_LENGTH * sr) as usize;
        let decay = 0.008 * sr;
        for hit in self.hit_times() {
            let first = (hit * sr) as usize;
            for k in 0..strike_len {
                let Some(sample) = samples.get_mut(first + k) else {
                    break;
                };
                let t = k as f64 / sr;
                let envelope = (-(k as f64) / decay).exp();
                let tone = (2.0 * PI * STRIKE_TONE_HZ * t).sin()
                    + 0.3 * (2.0 * PI * STRIKE_OVERTONE_HZ * t).sin();
                *sample = (*sample + (0.65 * envelope * tone) as f32).clamp(-1.0, 1.0);
            }
        }
        samples
    }

    pub fn audio_provider(&self) -> WavAudioProvider {
        WavAudioProvider::from_samples(self.render_audio(), self.sample_rate, 1)
    }

    pub fn video(&self) -> SyntheticVideo {
        SyntheticVideo {
            duration: self.duration,
            frame_rate: self.frame_rate,
            rallies: Arc::from(self.rallies.clone()),
        }
    }

    /// Export the scripted poses as a pose track sampled at `fps`
    pub fn pose_track(&self, fps: f64) -> PoseTrack {
        let video = self.video();
        let count = (self.duration * fps).floor() as usize;
        PoseTrack {
            duration: self.duration,
            frame_rate: fps,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            frames: (0..count)
                .map(|k| {
                    let timestamp = k as f64 / fps;
                    PoseTrackFrame {
                        timestamp,
                        people: vec![
                            video.player_pose(timestamp, false),
                            video.player_pose(timestamp, true),
                        ],
                    }
                })
                .collect(),
        }
    }

    /// Bundle providers for the engine, optionally without an audio track
    pub fn media_source(&self, include_audio: bool) -> MediaSource {
        let video = Arc::new(self.video());
        MediaSource {
            video_id: self.video_id.clone(),
            audio: include_audio.then(|| {
                Arc::new(self.audio_provider()) as Arc<dyn crate::media::AudioSampleProvider>
            }),
            video: video.clone(),
            pose: video,
        }
    }

    /// Hand-annotation equivalent of the scripted rallies
    pub fn ground_truth(&self) -> GroundTruthData {
        let mut metadata = BTreeMap::new();
        metadata.insert("generator".to_string(), "synthetic".to_string());
        metadata.insert("seed".to_string(), self.seed.to_string());
        GroundTruthData {
            video: format!("{}.mp4", self.video_id),
            rallies: self
                .rallies
                .iter()
                .map(|rally| GroundTruthRally {
                    start_time: rally.start,
                    end_time: rally.end,
                    excitement_score: None,
                    notes: None,
                })
                .collect(),
            metadata: Some(metadata),
            source_dir: None,
        }
    }
}

/// Rendered video plus its scripted pose estimator
#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    duration: f64,
    frame_rate: f64,
    rallies: Arc<[SyntheticRally]>,
}

impl SyntheticVideo {
    fn active_rally(&self, timestamp: f64) -> Option<&SyntheticRally> {
        self.rallies.iter().find(|rally| rally.contains(timestamp))
    }

    /// Player pose at `timestamp`; `far` selects the far-court player
    fn player_pose(&self, timestamp: f64, far: bool) -> PoseObservation {
        let (swing, footwork) = match self.active_rally(timestamp) {
            Some(rally) => (0.2 * rally.intensity, 0.08 * rally.intensity),
            None => (IDLE_AMPLITUDE, IDLE_AMPLITUDE),
        };
        let phase = if far { PI / 3.0 } else { 0.0 };
        let swing_angle = 2.0 * PI * timestamp / SWING_PERIOD + phase;
        let step_angle = 2.0 * PI * timestamp / FOOTWORK_PERIOD + phase;

        let center_x = 0.5 + footwork * step_angle.sin();
        let (torso_y, confidence) = if far { (0.3, 0.65) } else { (0.65, 0.9) };

        let mut keypoints = BTreeMap::new();
        let mut put = |joint: Joint, x: f64, y: f64| {
            keypoints.insert(
                joint,
                Keypoint {
                    x,
                    y,
                    confidence,
                },
            );
        };
        put(Joint::Nose, center_x, torso_y - 0.1);
        put(Joint::LeftShoulder, center_x - 0.03, torso_y - 0.06);
        put(Joint::RightShoulder, center_x + 0.03, torso_y - 0.06);
        put(Joint::LeftHip, center_x - 0.02, torso_y + 0.04);
        put(Joint::RightHip, center_x + 0.02, torso_y + 0.04);
        put(
            Joint::RightWrist,
            center_x + 0.05 + swing * swing_angle.sin(),
            torso_y,
        );
        put(
            Joint::LeftWrist,
            center_x - 0.05 + swing * swing_angle.cos(),
            torso_y,
        );

        PoseObservation {
            confidence,
            keypoints,
        }
    }

    fn render_luma(&self, timestamp: f64) -> Vec<u8> {
        let mut luma = vec![40u8; (FRAME_WIDTH * FRAME_HEIGHT) as usize];
        for far in [false, true] {
            let pose = self.player_pose(timestamp, far);
            let Some(center) = pose.body_center() else {
                continue;
            };
            let cx = (center.x * FRAME_WIDTH as f64).round() as i64;
            let cy = (center.y * FRAME_HEIGHT as f64).round() as i64;
            for y in (cy - 2)..=(cy + 2) {
                for x in (cx - 1)..=(cx + 1) {
                    if (0..FRAME_WIDTH as i64).contains(&x) && (0..FRAME_HEIGHT as i64).contains(&y)
                    {
                        luma[(y as u32 * FRAME_WIDTH + x as u32) as usize] = 220;
                    }
                }
            }
        }
        luma
    }
}

impl VideoFrameProvider for SyntheticVideo {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_at(&self, timestamp: f64) -> Result<VideoFrame, MediaError> {
        if !(0.0..=self.duration).contains(&timestamp) {
            return Err(MediaError::DecodeFailed {
                timestamp,
                details: "timestamp outside synthetic video".to_string(),
            });
        }
        // Snap to the native frame grid, tolerating float drift just below a frame edge.
        let index = (timestamp * self.frame_rate + 1e-6).floor();
        let snapped = index / self.frame_rate;
        Ok(VideoFrame {
            timestamp: snapped,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            luma: Arc::from(self.render_luma(snapped)),
        })
    }
}

impl PoseEstimator for SyntheticVideo {
    fn estimate(&self, frame: &VideoFrame) -> Result<Vec<PoseObservation>, MediaError> {
        Ok(vec![
            self.player_pose(frame.timestamp, false),
            self.player_pose(frame.timestamp, true),
        ])
    }
}
