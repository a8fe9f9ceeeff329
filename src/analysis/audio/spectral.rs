// Spectral module - frequency-domain features of a strike window
//
// All features are computed from the magnitude spectrum produced by
// `FftProcessor`. Energy is taken as squared magnitude.

/// Spectral feature computation for one sample rate / FFT size pair
pub struct SpectralFeatures {
    sample_rate: u32,
    fft_size: usize,
}

impl SpectralFeatures {
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT window size
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            fft_size,
        }
    }

    fn bin_width(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Frequency (Hz) of the strongest bin, ignoring DC
    pub fn dominant_frequency(&self, spectrum: &[f32]) -> f64 {
        spectrum
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i as f64 * self.bin_width())
            .unwrap_or(0.0)
    }

    /// Fraction of spectral energy inside `[min_hz, max_hz]`
    ///
    /// # Returns
    /// Ratio in [0, 1]; 0 for a silent window
    pub fn band_energy_ratio(&self, spectrum: &[f32], min_hz: f64, max_hz: f64) -> f64 {
        let bin_width = self.bin_width();
        let mut total = 0.0f64;
        let mut in_band = 0.0f64;
        for (i, &mag) in spectrum.iter().enumerate() {
            let energy = (mag as f64) * (mag as f64);
            total += energy;
            let freq = i as f64 * bin_width;
            if freq >= min_hz && freq <= max_hz {
                in_band += energy;
            }
        }

        if total > 1e-12 {
            (in_band / total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_ratio_counts_only_band_bins() {
        // 8 bins of 100 Hz each
        let features = SpectralFeatures::new(1600, 16);
        let mut spectrum = vec![0.0f32; 9];
        spectrum[2] = 1.0; // 200 Hz
        spectrum[6] = 1.0; // 600 Hz
        assert!((features.band_energy_ratio(&spectrum, 500.0, 700.0) - 0.5).abs() < 1e-9);
        assert_eq!(features.band_energy_ratio(&[0.0; 9], 500.0, 700.0), 0.0);
    }

    #[test]
    fn test_dominant_frequency_skips_dc() {
        let features = SpectralFeatures::new(1600, 16);
        let mut spectrum = vec![0.0f32; 9];
        spectrum[0] = 10.0;
        spectrum[3] = 2.0;
        assert_eq!(features.dominant_frequency(&spectrum), 300.0);
    }
}
