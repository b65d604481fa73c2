//! FFT plumbing for the spectral resampler.
//!
//! Wraps `rustfft` plans for a fixed transform size so the resampler can
//! run one forward transform at the padded input length and one inverse
//! transform at the target length without re-planning per day. Channels
//! are real-valued; they ride in the real part of [`Complex64`] buffers
//! and come back out of the inverse transform the same way.

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Paired forward/inverse plans at one transform length.
///
/// The resampler holds two of these per day: one at the padded channel
/// length and one at the target length.
pub struct FftProcessor {
    /// Transform length, fixed at construction
    size: usize,
    /// Forward plan, time samples to spectrum
    fft_forward: Arc<dyn Fft<f64>>,
    /// Inverse plan, rebuilt spectrum back to samples
    fft_inverse: Arc<dyn Fft<f64>>,
    /// Scratch shared by both plans, sized for the larger requirement
    scratch: Vec<Complex64>,
}

impl fmt::Debug for FftProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftProcessor")
            .field("size", &self.size)
            .finish()
    }
}

impl FftProcessor {
    /// Plan both directions at `size` samples.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(size);
        let fft_inverse = planner.plan_fft_inverse(size);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());
        let scratch = vec![Complex64::new(0.0, 0.0); scratch_len];

        Self {
            size,
            fft_forward,
            fft_inverse,
            scratch,
        }
    }

    /// Transform length both plans were built for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform of a full-length buffer, in place.
    pub fn fft_inplace(&mut self, buffer: &mut [Complex64]) {
        assert_eq!(buffer.len(), self.size);
        self.fft_forward
            .process_with_scratch(buffer, &mut self.scratch);
    }

    /// Spectrum of a channel, zero-padded up to the transform length.
    pub fn fft(&mut self, input: &[Complex64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input.to_vec();
        buffer.resize(self.size, Complex64::new(0.0, 0.0));
        self.fft_inplace(&mut buffer);
        buffer
    }

    /// Inverse transform in place, scaled by 1/N so a round trip
    /// reproduces the input samples.
    pub fn ifft_inplace(&mut self, buffer: &mut [Complex64]) {
        assert_eq!(buffer.len(), self.size);
        self.fft_inverse
            .process_with_scratch(buffer, &mut self.scratch);

        let scale = 1.0 / self.size as f64;
        for sample in buffer.iter_mut() {
            *sample *= scale;
        }
    }

    /// Samples rebuilt from a spectrum, zero-padded up to the transform
    /// length.
    pub fn ifft(&mut self, input: &[Complex64]) -> Vec<Complex64> {
        let mut buffer = input.to_vec();
        buffer.resize(self.size, Complex64::new(0.0, 0.0));
        self.ifft_inplace(&mut buffer);
        buffer
    }
}

/// Smallest power of two strictly greater than `n`.
///
/// An exact power of two is doubled, so padding a channel to this length
/// always appends at least one zero. That keeps the resampler's transform
/// lengths fast without special-casing already-padded inputs.
pub fn next_power_of_two_above(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    1 << (usize::BITS - n.leading_zeros())
}

/// Lift a real channel into complex samples.
pub fn to_complex(data: &[f64]) -> Vec<Complex64> {
    data.iter().map(|&v| Complex64::new(v, 0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_fft_ifft_round_trip() {
        let mut proc = FftProcessor::new(64);
        let input: Vec<Complex64> = (0..64)
            .map(|i| Complex64::new((i as f64 * 0.3).sin(), 0.0))
            .collect();

        let spectrum = proc.fft(&input);
        let back = proc.ifft(&spectrum);

        for (orig, rec) in input.iter().zip(back.iter()) {
            assert_relative_eq!(orig.re, rec.re, epsilon = 1e-10);
            assert_relative_eq!(orig.im, rec.im, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_fft_of_tone_peaks_at_its_bin() {
        let n = 64;
        let mut proc = FftProcessor::new(n);
        let input: Vec<Complex64> = (0..n)
            .map(|i| Complex64::new((2.0 * PI * 8.0 * i as f64 / n as f64).cos(), 0.0))
            .collect();

        let spectrum = proc.fft(&input);
        // A real cosine splits evenly between bins 8 and n-8.
        assert_relative_eq!(spectrum[8].norm(), n as f64 / 2.0, epsilon = 1e-9);
        assert_relative_eq!(spectrum[n - 8].norm(), n as f64 / 2.0, epsilon = 1e-9);
        assert!(spectrum[3].norm() < 1e-9);
    }

    #[test]
    fn test_fft_zero_pads_short_input() {
        let mut proc = FftProcessor::new(16);
        let input = vec![Complex64::new(1.0, 0.0); 4];
        let spectrum = proc.fft(&input);
        assert_eq!(spectrum.len(), 16);
        // DC bin holds the plain sum of the padded input.
        assert_relative_eq!(spectrum[0].re, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_next_power_of_two_above() {
        assert_eq!(next_power_of_two_above(0), 1);
        assert_eq!(next_power_of_two_above(1), 2);
        assert_eq!(next_power_of_two_above(5), 8);
        assert_eq!(next_power_of_two_above(8), 16);
        assert_eq!(next_power_of_two_above(1000), 1024);
        assert_eq!(next_power_of_two_above(1024), 2048);
        assert_eq!(next_power_of_two_above(93_600), 131_072);
    }

    #[test]
    fn test_to_complex_preserves_values() {
        let data = [1.5, -2.0, 0.0];
        let complex = to_complex(&data);
        assert_eq!(complex.len(), 3);
        for (c, &v) in complex.iter().zip(data.iter()) {
            assert_eq!(c.re, v);
            assert_eq!(c.im, 0.0);
        }
    }
}
