// FFT module - windowed magnitude spectra for hit detection
//
// The forward transform is planned once per analyzer run and shared by every
// window; a Hann window is applied to reduce spectral leakage between the
// strike band and low-frequency court noise.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT processor that computes magnitude spectra from audio windows
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Hann window for FFT (pre-computed)
    window: Vec<f32>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `fft_size` - FFT window size (`fftWindowSize`, default 2048)
    pub fn new(fft_size: usize) -> Self {
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();

        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            fft_size,
            window,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Compute magnitude spectrum using FFT
    ///
    /// Applies Hann windowing, zero-pads short windows, and returns the
    /// magnitudes of the positive frequencies only.
    ///
    /// # Returns
    /// Magnitude spectrum (size = fft_size / 2 + 1)
    pub fn compute_magnitude_spectrum(&self, audio: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = audio
            .iter()
            .zip(self.window.iter())
            .map(|(&sample, &weight)| Complex::new(sample * weight, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        buffer[..self.fft_size / 2 + 1]
            .iter()
            .map(|c| c.norm())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sample_rate = 8000.0;
        let processor = FftProcessor::new(256);
        // 1000 Hz lands exactly on bin 32 for a 256-point FFT at 8 kHz
        let signal: Vec<f32> = (0..256)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate).sin())
            .collect();
        let spectrum = processor.compute_magnitude_spectrum(&signal);
        assert_eq!(spectrum.len(), 129);

        let peak_bin = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 32);
    }

    #[test]
    fn test_short_window_is_zero_padded() {
        let processor = FftProcessor::new(64);
        let spectrum = processor.compute_magnitude_spectrum(&[0.0; 10]);
        assert_eq!(spectrum.len(), 33);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }
}
