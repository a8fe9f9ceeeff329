// AudioAnalyzer - windowed spectral analysis for ball-strike detection
//
// Algorithm:
// 1. Downmix the requested range to mono
// 2. Slide an `fftWindowSize` window with `audioHopSize` hop
// 3. Per window: peak amplitude, dominant frequency, share of energy in the
//    strike band, and a confidence combining band share with loudness
// 4. Windows louder than `audioAmplitudeThreshold` become peaks
// 5. Peaks closer than `minHitInterval` collapse to the strongest one
//    (overlapping windows report the same strike twice)

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ThresholdConfig;
use crate::engine::CancellationToken;
use crate::error::MediaError;
use crate::media::AudioSampleProvider;
use crate::time_range::TimeRange;

pub mod fft;
pub mod spectral;

use fft::FftProcessor;
use spectral::SpectralFeatures;

/// Windows processed between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 64;

/// Share of the confidence taken by the strike-band energy ratio
const BAND_CONFIDENCE_WEIGHT: f64 = 0.7;

/// Candidate ball strike in the audio track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioPeak {
    /// Seconds from the start of the video (before sync-offset correction)
    pub timestamp: f64,
    /// Peak absolute sample value, [0, 1]
    pub amplitude: f64,
    /// Dominant frequency of the window (Hz)
    pub frequency: f64,
    pub confidence: f64,
    /// Fraction of window energy inside the strike band
    pub spectral_energy: f64,
}

/// Thresholds behind the hit-sound predicate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitCriteria {
    pub frequency_min: f64,
    pub frequency_max: f64,
    pub amplitude_threshold: f64,
    pub confidence_threshold: f64,
}

impl HitCriteria {
    pub fn from_config(config: &ThresholdConfig) -> Self {
        Self {
            frequency_min: config.hit_frequency_min,
            frequency_max: config.hit_frequency_max,
            amplitude_threshold: config.audio_amplitude_threshold,
            confidence_threshold: config.hit_confidence_threshold,
        }
    }
}

impl AudioPeak {
    /// Strike-like: in-band dominant frequency, loud and confident
    pub fn is_likely_hit_sound(&self, criteria: &HitCriteria) -> bool {
        self.frequency >= criteria.frequency_min
            && self.frequency <= criteria.frequency_max
            && self.amplitude > criteria.amplitude_threshold
            && self.confidence > criteria.confidence_threshold
    }
}

/// Output of one audio analysis pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnalysis {
    /// Ordered by timestamp
    pub peaks: Vec<AudioPeak>,
    pub sample_rate: u32,
    /// Wall-clock seconds spent analysing
    pub processing_time: f64,
    pub range: TimeRange,
    pub windows_analysed: usize,
    pub criteria: HitCriteria,
}

impl AudioAnalysis {
    /// Analysis of a range with no usable audio
    pub fn empty(range: TimeRange, criteria: HitCriteria) -> Self {
        Self {
            peaks: Vec::new(),
            sample_rate: 0,
            processing_time: 0.0,
            range,
            windows_analysed: 0,
            criteria,
        }
    }

    /// Peaks inside `range` that pass the hit-sound predicate
    pub fn hit_sounds(&self, range: TimeRange) -> Vec<AudioPeak> {
        self.peaks
            .iter()
            .filter(|peak| range.contains(peak.timestamp))
            .filter(|peak| peak.is_likely_hit_sound(&self.criteria))
            .copied()
            .collect()
    }

    /// Hit sounds per second over `range`; 0 for an empty range
    pub fn hit_density(&self, range: TimeRange) -> f64 {
        if range.is_empty() {
            return 0.0;
        }
        self.hit_sounds(range).len() as f64 / range.duration()
    }

    /// Join per-chunk analyses (given in chronological order)
    pub fn concat(parts: Vec<AudioAnalysis>, range: TimeRange, criteria: HitCriteria) -> Self {
        let mut merged = Self::empty(range, criteria);
        for part in parts {
            merged.sample_rate = merged.sample_rate.max(part.sample_rate);
            merged.processing_time += part.processing_time;
            merged.windows_analysed += part.windows_analysed;
            merged.peaks.extend(part.peaks);
        }
        merged
            .peaks
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        merged
    }
}

/// Extracts ball-strike candidates from an audio track
pub struct AudioAnalyzer {
    config: Arc<ThresholdConfig>,
}

impl AudioAnalyzer {
    pub fn new(config: Arc<ThresholdConfig>) -> Self {
        Self { config }
    }

    /// Analyze `range` of the provider's track
    pub fn analyze(
        &self,
        provider: &dyn AudioSampleProvider,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> Result<AudioAnalysis, MediaError> {
        cancel.check()?;
        let buffer = provider.read(range)?;
        let mono = buffer.to_mono();
        let mut analysis =
            self.analyze_samples(&mono, buffer.sample_rate, buffer.start_time, cancel)?;
        analysis.range = range;
        Ok(analysis)
    }

    /// Analyze mono samples whose first sample sits at `offset` seconds
    pub fn analyze_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
        offset: f64,
        cancel: &CancellationToken,
    ) -> Result<AudioAnalysis, MediaError> {
        let started = Instant::now();
        let criteria = HitCriteria::from_config(&self.config);
        let window_size = self.config.fft_window_size;
        let hop_size = self.config.audio_hop_size.max(1);
        let end_time = offset + samples.len() as f64 / sample_rate.max(1) as f64;
        let range = TimeRange::new(offset, end_time);

        if samples.is_empty() || sample_rate == 0 {
            return Ok(AudioAnalysis::empty(range, criteria));
        }

        let fft = FftProcessor::new(window_size);
        let spectral = SpectralFeatures::new(sample_rate, window_size);
        let mut raw_peaks = Vec::new();
        let mut windows = 0usize;
        let mut start = 0usize;

        loop {
            if windows % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }
            let end = (start + window_size).min(samples.len());
            let window = &samples[start..end];
            windows += 1;

            let (max_index, amplitude) = window
                .iter()
                .enumerate()
                .map(|(i, s)| (i, s.abs() as f64))
                .fold((0, 0.0f64), |best, cur| if cur.1 > best.1 { cur } else { best });
            let amplitude = amplitude.min(1.0);

            if amplitude > self.config.audio_amplitude_threshold {
                let spectrum = fft.compute_magnitude_spectrum(window);
                let band_ratio = spectral.band_energy_ratio(
                    &spectrum,
                    self.config.hit_frequency_min,
                    self.config.hit_frequency_max,
                );
                let loudness =
                    (amplitude / (2.0 * self.config.audio_amplitude_threshold)).min(1.0);
                let confidence = (BAND_CONFIDENCE_WEIGHT * band_ratio
                    + (1.0 - BAND_CONFIDENCE_WEIGHT) * loudness)
                    .clamp(0.0, 1.0);

                raw_peaks.push(AudioPeak {
                    timestamp: offset + (start + max_index) as f64 / sample_rate as f64,
                    amplitude,
                    frequency: spectral.dominant_frequency(&spectrum),
                    confidence,
                    spectral_energy: band_ratio,
                });
            }

            if end >= samples.len() {
                break;
            }
            start += hop_size;
        }

        let peaks = deduplicate_peaks(raw_peaks, self.config.min_hit_interval);
        let processing_time = started.elapsed().as_secs_f64();
        tracing::debug!(
            "[AudioAnalyzer] {:.1}-{:.1}s: {} windows, {} peaks in {:.3}s",
            range.start,
            range.end,
            windows,
            peaks.len(),
            processing_time
        );

        Ok(AudioAnalysis {
            peaks,
            sample_rate,
            processing_time,
            range,
            windows_analysed: windows,
            criteria,
        })
    }
}

/// Collapse peaks closer than `min_interval`, keeping the most confident
fn deduplicate_peaks(mut peaks: Vec<AudioPeak>, min_interval: f64) -> Vec<AudioPeak> {
    peaks.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    let mut kept: Vec<AudioPeak> = Vec::with_capacity(peaks.len());
    for peak in peaks {
        match kept.last_mut() {
            Some(last) if peak.timestamp - last.timestamp < min_interval => {
                let stronger = peak.confidence > last.confidence
                    || (peak.confidence == last.confidence && peak.amplitude > last.amplitude);
                if stronger {
                    *last = peak;
                }
            }
            _ => kept.push(peak),
        }
    }
    kept
}
