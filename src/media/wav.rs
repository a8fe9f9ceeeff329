//! WAV-backed audio provider.
//!
//! Loads a PCM WAV file (the audio track extracted from a recording by an
//! external demuxer) fully into memory and serves time-ranged reads.

use std::path::Path;

use crate::error::{log_media_error, MediaError};
use crate::media::{AudioBuffer, AudioSampleProvider};
use crate::time_range::TimeRange;

/// In-memory WAV audio track
#[derive(Debug, Clone)]
pub struct WavAudioProvider {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl WavAudioProvider {
    /// Decode a WAV file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let provider = hound::WavReader::open(path)
            .map_err(|err| MediaError::Unreadable {
                details: format!("failed to open {label}: {err}"),
            })
            .and_then(|reader| Self::from_reader(reader, &label))
            .inspect_err(|err| log_media_error(err, "WavAudioProvider::open"))?;
        tracing::info!(
            "[WavAudioProvider] Loaded {} ({} Hz, {} ch, {:.1}s)",
            path.display(),
            provider.sample_rate,
            provider.channels,
            provider.duration()
        );
        Ok(provider)
    }

    /// Wrap already-decoded interleaved samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Write the track as 32-bit float PCM
    pub fn write_wav<P: AsRef<Path>>(&self, path: P) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    }

    fn from_reader<R: std::io::Read>(
        mut reader: hound::WavReader<R>,
        label: &str,
    ) -> Result<Self, MediaError> {
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(MediaError::AudioTrackMissing);
        }

        let read_error = |err: hound::Error| MediaError::DecodeFailed {
            timestamp: 0.0,
            details: format!("error reading {label}: {err}"),
        };

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|sample| sample.map_err(read_error))
                .collect::<Result<Vec<f32>, _>>()?,
            hound::SampleFormat::Int => match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|v| v as f32 / i16::MAX as f32).map_err(read_error))
                    .collect::<Result<Vec<f32>, _>>()?,
                24 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|v| v as f32 / 8_388_607.0)
                            .map_err(read_error)
                    })
                    .collect::<Result<Vec<f32>, _>>()?,
                32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / i32::MAX as f32).map_err(read_error))
                    .collect::<Result<Vec<f32>, _>>()?,
                bits => {
                    return Err(MediaError::Unreadable {
                        details: format!("unsupported bits_per_sample={} for {}", bits, label),
                    })
                }
            },
        };

        if samples.is_empty() {
            return Err(MediaError::AudioTrackMissing);
        }

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }
}

impl AudioSampleProvider for WavAudioProvider {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn duration(&self) -> f64 {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }

    fn read(&self, range: TimeRange) -> Result<AudioBuffer, MediaError> {
        if self.samples.is_empty() {
            return Err(MediaError::AudioTrackMissing);
        }
        let channels = self.channels.max(1) as usize;
        let total_frames = self.samples.len() / channels;
        let first = ((range.start.max(0.0) * self.sample_rate as f64).floor() as usize)
            .min(total_frames);
        let last =
            ((range.end.max(0.0) * self.sample_rate as f64).ceil() as usize).min(total_frames);
        let last = last.max(first);

        Ok(AudioBuffer {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: self.samples[first * channels..last * channels].to_vec(),
            start_time: first as f64 / self.sample_rate as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_clips_to_track() {
        let provider = WavAudioProvider::from_samples(vec![0.1; 8000], 8000, 1);
        assert!((provider.duration() - 1.0).abs() < 1e-9);

        let buffer = provider.read(TimeRange::new(0.5, 2.0)).unwrap();
        assert_eq!(buffer.frame_count(), 4000);
        assert!((buffer.start_time - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_stereo_read_keeps_interleaving() {
        let provider = WavAudioProvider::from_samples(vec![0.0; 16000], 8000, 2);
        let buffer = provider.read(TimeRange::new(0.0, 0.25)).unwrap();
        assert_eq!(buffer.channels, 2);
        assert_eq!(buffer.samples.len(), 4000);
    }

    #[test]
    fn test_empty_track_reports_missing_audio() {
        let provider = WavAudioProvider::from_samples(Vec::new(), 8000, 1);
        assert_eq!(
            provider.read(TimeRange::new(0.0, 1.0)),
            Err(MediaError::AudioTrackMissing)
        );
    }

    #[test]
    fn test_open_written_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("court.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..8000 {
            writer
                .write_sample(if i % 2 == 0 { 16_000i16 } else { -16_000i16 })
                .unwrap();
        }
        writer.finalize().unwrap();

        let provider = WavAudioProvider::open(&path).unwrap();
        assert_eq!(provider.sample_rate(), 8000);
        let buffer = provider.read(TimeRange::new(0.0, 1.0)).unwrap();
        assert!((buffer.samples[0] - 16_000.0 / i16::MAX as f32).abs() < 1e-6);
    }

    #[test]
    fn test_float_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let original = WavAudioProvider::from_samples(vec![0.25, -0.5, 0.75, 0.0], 16_000, 2);
        original.write_wav(&path).unwrap();

        let reopened = WavAudioProvider::open(&path).unwrap();
        assert_eq!(reopened.channel_count(), 2);
        assert_eq!(
            reopened.read(TimeRange::new(0.0, 1.0)).unwrap().samples,
            vec![0.25, -0.5, 0.75, 0.0]
        );
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        assert!(matches!(
            WavAudioProvider::open("/nonexistent/court.wav"),
            Err(MediaError::Unreadable { .. })
        ));
    }
}
