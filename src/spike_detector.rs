//! Sigma-threshold outlier detection against a smoothed baseline.
//!
//! A spike is a sample whose residual (raw minus baseline) exceeds a
//! configured multiple of the residual standard deviation. Each sample is
//! tested against the spread of the *other* residuals: a single large
//! excursion must not inflate the very threshold it is judged by, which on
//! short windows would mask it entirely. On day-length windows the
//! leave-one-out estimate is indistinguishable from the plain one.
//!
//! Event times are reported in minutes from the window start, the
//! convention downstream magnetogram review tooling expects.

use tracing::debug;

use crate::smoother::SmoothedSeries;
use crate::types::{MagError, MagResult};

/// Spike detector configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeConfig {
    /// Threshold in multiples of the residual standard deviation.
    pub sigma: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self { sigma: 4.0 }
    }
}

/// One flagged sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeEvent {
    /// Sample index into the channel.
    pub index: usize,
    /// Event time in minutes from the window start (`index / rate / 60`).
    pub minutes: f64,
    /// Raw sample value at the index.
    pub value: f64,
    /// Raw minus baseline at the index.
    pub residual: f64,
}

/// Flag every sample of `raw` deviating from `baseline` by more than
/// `sigma` standard deviations of the residual.
///
/// Returns an empty vector (never an error) when nothing exceeds the
/// threshold. Samples whose residual is not finite are left out of both the
/// spread estimate and the flagging sweep, so gap fills cannot trip or
/// suppress detection.
pub fn detect_spikes(
    raw: &[f64],
    baseline: &[f64],
    sample_rate_hz: f64,
    config: &SpikeConfig,
) -> MagResult<Vec<SpikeEvent>> {
    if raw.len() != baseline.len() {
        return Err(MagError::LengthMismatch {
            expected: raw.len(),
            got: baseline.len(),
        });
    }
    if !config.sigma.is_finite() || config.sigma <= 0.0 {
        return Err(MagError::InvalidParameter(format!(
            "spike threshold must be positive and finite, got {} sigma",
            config.sigma
        )));
    }
    if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
        return Err(MagError::InvalidParameter(format!(
            "sample rate must be positive and finite, got {sample_rate_hz}"
        )));
    }

    // Sufficient statistics over the finite residuals; the per-sample
    // leave-one-out spread falls out of these in O(1).
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for i in 0..raw.len() {
        let r = raw[i] - baseline[i];
        if r.is_finite() {
            count += 1;
            sum += r;
            sum_sq += r * r;
        }
    }
    if count < 2 {
        return Ok(Vec::new());
    }

    let mut events = Vec::new();
    for i in 0..raw.len() {
        let r = raw[i] - baseline[i];
        if !r.is_finite() {
            continue;
        }
        let rest = (count - 1) as f64;
        let rest_mean = (sum - r) / rest;
        let rest_var = ((sum_sq - r * r) / rest - rest_mean * rest_mean).max(0.0);
        let threshold = config.sigma * rest_var.sqrt();
        if r.abs() > threshold {
            events.push(SpikeEvent {
                index: i,
                minutes: i as f64 / sample_rate_hz / 60.0,
                value: raw[i],
                residual: r,
            });
        }
    }

    if !events.is_empty() {
        debug!(
            spikes = events.len(),
            sigma = config.sigma,
            "flagged outliers against smoothed baseline"
        );
    }
    Ok(events)
}

/// Run detection on all three axes of a smoothed/trimmed pair.
///
/// The raw side is the symmetrically trimmed copy and the baseline is the
/// moving average, so residuals compare like with like. Returned in X, Y, Z
/// order; event times count from the trimmed window's first sample.
pub fn detect_series_spikes(
    pair: &SmoothedSeries,
    config: &SpikeConfig,
) -> MagResult<[Vec<SpikeEvent>; 3]> {
    let rate = pair.trimmed.sample_rate_hz();
    Ok([
        detect_spikes(pair.trimmed.x(), pair.smoothed.x(), rate, config)?,
        detect_spikes(pair.trimmed.y(), pair.smoothed.y(), rate, config)?,
        detect_spikes(pair.trimmed.z(), pair.smoothed.z(), rate, config)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::ThreeAxisSeries;
    use crate::smoother::smooth_series;

    const TOL: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < TOL
    }

    #[test]
    fn test_single_large_spike_is_flagged() {
        let raw = [0.0, 0.0, 0.0, 100.0, 0.0, 0.0];
        let baseline = [0.0; 6];
        let events = detect_spikes(&raw, &baseline, 1.0, &SpikeConfig::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 3);
        assert!(approx_eq(events[0].value, 100.0));
        assert!(approx_eq(events[0].residual, 100.0));
        assert!(approx_eq(events[0].minutes, 3.0 / 60.0));
    }

    #[test]
    fn test_clean_signal_yields_no_events() {
        let raw: Vec<f64> = (0..100).map(|i| (0.1 * i as f64).sin()).collect();
        let events = detect_spikes(&raw, &raw, 1.0, &SpikeConfig::default()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_bounded_noise_stays_quiet_until_outlier_lands() {
        let baseline = vec![0.0; 200];
        let mut raw: Vec<f64> = (0..200).map(|i| (0.7 * i as f64).sin()).collect();
        let quiet = detect_spikes(&raw, &baseline, 1.0, &SpikeConfig::default()).unwrap();
        // A unit-amplitude sine never reaches four standard deviations of
        // itself (its spread is about 0.71).
        assert!(quiet.is_empty());

        raw[50] += 100.0;
        let events = detect_spikes(&raw, &baseline, 1.0, &SpikeConfig::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 50);
    }

    #[test]
    fn test_minutes_reflect_sample_rate() {
        let mut raw = vec![0.0; 200];
        raw[120] = 50.0;
        let baseline = vec![0.0; 200];
        let events = detect_spikes(&raw, &baseline, 2.0, &SpikeConfig::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert!(approx_eq(events[0].minutes, 1.0));
    }

    #[test]
    fn test_nan_residuals_are_ignored() {
        let raw = [0.0, 0.0, f64::NAN, 100.0, 0.0, 0.0];
        let baseline = [0.0; 6];
        let events = detect_spikes(&raw, &baseline, 1.0, &SpikeConfig::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 3);
    }

    #[test]
    fn test_constant_offset_flags_everything() {
        // A constant residual has zero spread, so every sample exceeds it.
        // Matches the historical behavior where std = 0 flagged all points.
        let raw = [5.0; 4];
        let baseline = [0.0; 4];
        let events = detect_spikes(&raw, &baseline, 1.0, &SpikeConfig::default()).unwrap();
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let raw = [0.0; 5];
        let baseline = [0.0; 4];
        assert!(matches!(
            detect_spikes(&raw, &baseline, 1.0, &SpikeConfig::default()),
            Err(MagError::LengthMismatch {
                expected: 5,
                got: 4
            })
        ));
    }

    #[test]
    fn test_bad_parameters_rejected() {
        let data = [0.0; 8];
        assert!(detect_spikes(&data, &data, 1.0, &SpikeConfig { sigma: 0.0 }).is_err());
        assert!(detect_spikes(&data, &data, 1.0, &SpikeConfig { sigma: -2.0 }).is_err());
        assert!(detect_spikes(&data, &data, 1.0, &SpikeConfig { sigma: f64::NAN }).is_err());
        assert!(detect_spikes(&data, &data, 0.0, &SpikeConfig::default()).is_err());
    }

    #[test]
    fn test_series_detection_finds_spike_on_one_axis_only() {
        let n = 600;
        let mut x: Vec<f64> = (0..n).map(|i| (0.05 * i as f64).sin()).collect();
        x[300] += 500.0;
        let series = ThreeAxisSeries::from_channels(
            x,
            vec![1.0; n],
            (0..n).map(|i| (0.03 * i as f64).cos()).collect(),
            (0..n).map(|i| i as f64).collect(),
            1.0,
        )
        .unwrap();

        let pair = smooth_series(&series, 10.0).unwrap();
        let [x_events, y_events, z_events] =
            detect_series_spikes(&pair, &SpikeConfig::default()).unwrap();

        assert_eq!(x_events.len(), 1);
        // The spike sits at raw index 300, which is 295 in the trimmed frame.
        assert_eq!(x_events[0].index, 295);
        assert!(y_events.is_empty());
        assert!(z_events.is_empty());
    }
}
