//! Rate reduction for conditioned channels.
//!
//! Two paths to the output rate:
//!
//! - **Spectral**: zero-pad the channel to the next power of two, take the
//!   full FFT, rebuild the spectrum at the target length, inverse-transform
//!   and truncate. Padding to a power of two keeps the transforms fast on
//!   day-scale channels; the caller chops the window edges afterward, which
//!   is where the padding artifacts live.
//! - **Decimation**: zero-phase low-pass at the target bandwidth, then take
//!   every `round(len / target_len)`-th sample and truncate.
//!
//! Both change the series length, so lead and trail bookkeeping kept in
//! source samples has to be rescaled by [`ResampledChannel::length_ratio`]
//! before it is applied to the output.

use rustfft::num_complex::Complex64;
use tracing::debug;

use crate::butterworth::low_pass_filter;
use crate::fft_utils::{next_power_of_two_above, to_complex, FftProcessor};
use crate::series::ThreeAxisSeries;
use crate::types::{MagError, MagResult};

/// One channel after spectral resampling, with the lengths behind it.
#[derive(Debug, Clone)]
pub struct ResampledChannel {
    /// Resampled samples, truncated to the requested length.
    pub samples: Vec<f64>,
    /// Channel length before padding.
    pub input_len: usize,
    /// Power-of-two length the transform actually ran at.
    pub padded_len: usize,
}

impl ResampledChannel {
    /// Output length over input length.
    ///
    /// Sample counts measured before resampling (window padding, mostly)
    /// are rescaled by this before being applied to the output.
    pub fn length_ratio(&self) -> f64 {
        self.samples.len() as f64 / self.input_len as f64
    }
}

/// Resample one channel to `target_len` samples through the frequency
/// domain.
///
/// The channel is zero-padded to the next power of two, transformed, and
/// the spectrum is rebuilt at `ceil(target_len * padded / input)` bins so
/// that truncating the inverse transform to `target_len` covers exactly
/// the unpadded span. Positive and negative frequency bins are copied
/// within the shared bandwidth; a Nyquist bin is joined when downsampling
/// and split when upsampling so real input stays real.
pub fn spectral_resample(data: &[f64], target_len: usize) -> MagResult<ResampledChannel> {
    if data.is_empty() {
        return Err(MagError::InvalidParameter(
            "cannot resample an empty channel".into(),
        ));
    }
    if target_len == 0 {
        return Err(MagError::InvalidParameter(
            "resample target length must be at least 1".into(),
        ));
    }

    let input_len = data.len();
    let padded_len = next_power_of_two_above(input_len);
    let fft_len = ((target_len as u64 * padded_len as u64 + input_len as u64 - 1)
        / input_len as u64) as usize;

    let mut forward = FftProcessor::new(padded_len);
    let spectrum = forward.fft(&to_complex(data));

    let mut target = build_target_spectrum(&spectrum, fft_len);
    let mut inverse = FftProcessor::new(fft_len);
    inverse.ifft_inplace(&mut target);

    let scale = fft_len as f64 / padded_len as f64;
    let samples: Vec<f64> = target
        .iter()
        .take(target_len)
        .map(|c| c.re * scale)
        .collect();

    debug!(input_len, padded_len, fft_len, target_len, "spectral resample");
    Ok(ResampledChannel {
        samples,
        input_len,
        padded_len,
    })
}

/// Rebuild a spectrum of length `num` from `spectrum`, keeping the bins
/// both lengths share.
fn build_target_spectrum(spectrum: &[Complex64], num: usize) -> Vec<Complex64> {
    let nx = spectrum.len();
    let n = num.min(nx);
    let nyq = n / 2 + 1;

    let mut target = vec![Complex64::new(0.0, 0.0); num];
    target[..nyq].copy_from_slice(&spectrum[..nyq]);
    if n > 2 {
        let neg = n - nyq;
        target[num - neg..].copy_from_slice(&spectrum[nx - neg..]);
    }

    if n % 2 == 0 {
        if num < nx {
            // The shared Nyquist bin absorbs its negative-frequency twin.
            target[num - n / 2] += spectrum[nx - n / 2];
        } else if nx < num {
            // The input's Nyquist bin splits across the two new bins.
            target[n / 2] *= 0.5;
            target[num - n / 2] = target[n / 2];
        }
    }

    target
}

/// Low-pass then stride-sample one channel down to `target_len` samples.
///
/// The stride is `round(len / target_len)`; the filtered channel is taken
/// every stride-th sample and truncated. The effective output rate is the
/// source rate divided by the stride.
pub fn decimate(
    data: &[f64],
    cutoff_hz: f64,
    source_rate_hz: f64,
    target_len: usize,
    order: usize,
) -> MagResult<Vec<f64>> {
    if target_len == 0 {
        return Err(MagError::InvalidParameter(
            "decimation target length must be at least 1".into(),
        ));
    }
    let stride = (data.len() as f64 / target_len as f64).round() as usize;
    if stride == 0 {
        return Err(MagError::InvalidParameter(format!(
            "cannot decimate {} samples up to {} samples",
            data.len(),
            target_len
        )));
    }

    let filtered = low_pass_filter(data, cutoff_hz, source_rate_hz, order)?;
    let mut out: Vec<f64> = filtered.into_iter().step_by(stride).collect();
    out.truncate(target_len);

    debug!(
        stride,
        target_len,
        out_len = out.len(),
        "stride decimation"
    );
    Ok(out)
}

/// Spectrally resample every channel of a series to `target_len` samples.
///
/// The sample rate scales by the length ratio and the time axis restarts
/// from zero at the new spacing. A total-field channel is recomputed from
/// the resampled components.
pub fn resample_series(series: &ThreeAxisSeries, target_len: usize) -> MagResult<ThreeAxisSeries> {
    let input_len = series.len();
    let x = spectral_resample(series.x(), target_len)?;
    let y = spectral_resample(series.y(), target_len)?;
    let z = spectral_resample(series.z(), target_len)?;

    let new_rate = series.sample_rate_hz() * target_len as f64 / input_len as f64;
    finish_series(series, x.samples, y.samples, z.samples, new_rate)
}

/// Decimate every channel of a series to `target_len` samples.
pub fn decimate_series(
    series: &ThreeAxisSeries,
    cutoff_hz: f64,
    target_len: usize,
    order: usize,
) -> MagResult<ThreeAxisSeries> {
    let rate = series.sample_rate_hz();
    let stride = (series.len() as f64 / target_len as f64).round() as usize;
    let x = decimate(series.x(), cutoff_hz, rate, target_len, order)?;
    let y = decimate(series.y(), cutoff_hz, rate, target_len, order)?;
    let z = decimate(series.z(), cutoff_hz, rate, target_len, order)?;

    let new_rate = rate / stride as f64;
    finish_series(series, x, y, z, new_rate)
}

fn finish_series(
    original: &ThreeAxisSeries,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    new_rate: f64,
) -> MagResult<ThreeAxisSeries> {
    let time: Vec<f64> = (0..x.len()).map(|i| i as f64 / new_rate).collect();
    let mut out = ThreeAxisSeries::from_channels(x, y, z, time, new_rate)?;
    if original.f().is_some() {
        out.compute_total_field();
    }
    Ok(out)
}
