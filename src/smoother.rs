//! Valid-mode moving-average smoothing.
//!
//! Produces the centered moving average of each channel, shrinking the
//! output by `window − 1` samples exactly as a valid-mode convolution with
//! a boxcar kernel would. A companion copy of the raw channels and the time
//! axis is trimmed symmetrically to the same length, so smoothed and raw
//! stay sample-for-sample comparable; spike detection depends on that
//! pairing. Uses a running sum, O(1) per sample regardless of window size.

use tracing::debug;

use crate::series::ThreeAxisSeries;
use crate::types::{MagError, MagResult};

/// A series and its moving-average baseline, trimmed to a shared length.
#[derive(Debug, Clone)]
pub struct SmoothedSeries {
    /// Moving-average output, `window − 1` samples shorter than the input.
    pub smoothed: ThreeAxisSeries,
    /// The input channels trimmed symmetrically to the smoothed length.
    pub trimmed: ThreeAxisSeries,
    /// Window length actually used, in samples.
    pub window: usize,
}

fn check_window(len: usize, window: usize) -> MagResult<()> {
    if window == 0 {
        return Err(MagError::InvalidParameter(
            "smoothing window must hold at least one sample".to_string(),
        ));
    }
    if window > len {
        return Err(MagError::InvalidParameter(format!(
            "smoothing window of {window} samples exceeds the series length {len}"
        )));
    }
    Ok(())
}

/// Valid-mode moving average of one channel.
///
/// Output sample `i` is the mean of `data[i..i + window]`, so the output
/// holds `len − window + 1` samples. A NaN must poison exactly the windows
/// that contain it, no more; the running sum therefore tracks finite values
/// and a NaN count side by side instead of folding NaN into the sum.
pub fn smooth_channel(data: &[f64], window: usize) -> MagResult<Vec<f64>> {
    check_window(data.len(), window)?;

    let scale = 1.0 / window as f64;
    let mut sum = 0.0;
    let mut nan_in_window = 0usize;
    for &v in &data[..window] {
        if v.is_nan() {
            nan_in_window += 1;
        } else {
            sum += v;
        }
    }

    let mut out = Vec::with_capacity(data.len() - window + 1);
    out.push(if nan_in_window > 0 {
        f64::NAN
    } else {
        sum * scale
    });
    for i in window..data.len() {
        let leaving = data[i - window];
        if leaving.is_nan() {
            nan_in_window -= 1;
        } else {
            sum -= leaving;
        }
        let entering = data[i];
        if entering.is_nan() {
            nan_in_window += 1;
        } else {
            sum += entering;
        }
        out.push(if nan_in_window > 0 {
            f64::NAN
        } else {
            sum * scale
        });
    }
    Ok(out)
}

/// Smooth every channel of a series over a window of `window_seconds`.
///
/// The window in samples is `window_seconds × sample_rate`, rounded. The
/// raw channels and the time axis are trimmed by `window/2` at the front
/// and whatever remains of `window − 1` at the back, which centers the
/// baseline under the samples it averages.
pub fn smooth_series(series: &ThreeAxisSeries, window_seconds: f64) -> MagResult<SmoothedSeries> {
    if !window_seconds.is_finite() || window_seconds <= 0.0 {
        return Err(MagError::InvalidParameter(format!(
            "smoothing window must be positive and finite, got {window_seconds} s"
        )));
    }
    let window = (window_seconds * series.sample_rate_hz()).round() as usize;
    check_window(series.len(), window)?;

    let smoothed_x = smooth_channel(series.x(), window)?;
    let smoothed_y = smooth_channel(series.y(), window)?;
    let smoothed_z = smooth_channel(series.z(), window)?;
    let smoothed_f = match series.f() {
        Some(f) => Some(smooth_channel(f, window)?),
        None => None,
    };

    let lead = window / 2;
    let trail = window - 1 - lead;
    let mut trimmed = series.clone();
    trimmed.chop(lead, trail)?;

    let smoothed = ThreeAxisSeries::from_components(
        smoothed_x,
        smoothed_y,
        smoothed_z,
        smoothed_f,
        trimmed.time().to_vec(),
        series.sample_rate_hz(),
    )?;

    debug!(
        window,
        len = smoothed.len(),
        "smoothed series with centered moving average"
    );

    Ok(SmoothedSeries {
        smoothed,
        trimmed,
        window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < TOL
    }

    fn ramp_series(n: usize, rate: f64) -> ThreeAxisSeries {
        let step = 1.0 / rate;
        ThreeAxisSeries::from_channels(
            (0..n).map(|i| i as f64).collect(),
            (0..n).map(|i| 2.0 * i as f64).collect(),
            vec![7.0; n],
            (0..n).map(|i| i as f64 * step).collect(),
            rate,
        )
        .unwrap()
    }

    // ------------------------------------------------------------------
    // 1. Channel smoothing
    // ------------------------------------------------------------------

    #[test]
    fn test_smooth_channel_constant_stays_constant() {
        let data = vec![5.0; 20];
        let out = smooth_channel(&data, 4).unwrap();
        assert_eq!(out.len(), 17);
        assert!(out.iter().all(|&v| approx_eq(v, 5.0)));
    }

    #[test]
    fn test_smooth_channel_window_of_one_is_identity() {
        let data = vec![1.0, -2.0, 3.5, 0.0];
        let out = smooth_channel(&data, 1).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_smooth_channel_matches_direct_windowed_mean() {
        let data: Vec<f64> = (0..200)
            .map(|i| (0.13 * i as f64).sin() + 0.01 * i as f64)
            .collect();
        let window = 9;
        let out = smooth_channel(&data, window).unwrap();
        assert_eq!(out.len(), data.len() - window + 1);
        for (i, &v) in out.iter().enumerate() {
            let direct: f64 = data[i..i + window].iter().sum::<f64>() / window as f64;
            assert!(approx_eq(v, direct), "index {i}: {v} vs {direct}");
        }
    }

    #[test]
    fn test_smooth_channel_nan_poisons_only_touching_windows() {
        let mut data = vec![1.0; 30];
        data[10] = f64::NAN;
        let window = 5;
        let out = smooth_channel(&data, window).unwrap();
        for (i, &v) in out.iter().enumerate() {
            // Window i covers data[i..i + 5].
            if i + window > 10 && i <= 10 {
                assert!(v.is_nan(), "window {i} should be poisoned");
            } else {
                assert!(approx_eq(v, 1.0), "window {i} should be clean, got {v}");
            }
        }
    }

    #[test]
    fn test_smooth_channel_rejects_bad_window() {
        let data = vec![0.0; 8];
        assert!(smooth_channel(&data, 0).is_err());
        assert!(smooth_channel(&data, 9).is_err());
        // Window exactly equal to the length is the smallest valid output.
        assert_eq!(smooth_channel(&data, 8).unwrap().len(), 1);
    }

    // ------------------------------------------------------------------
    // 2. Series smoothing and trim
    // ------------------------------------------------------------------

    #[test]
    fn test_ten_second_window_at_one_hertz_shrinks_by_nine() {
        let series = ramp_series(1000, 1.0);
        let result = smooth_series(&series, 10.0).unwrap();
        assert_eq!(result.window, 10);
        assert_eq!(result.smoothed.len(), 1000 - 9);
        assert_eq!(result.trimmed.len(), 1000 - 9);
    }

    #[test]
    fn test_smoothed_value_is_mean_of_surrounding_window() {
        let series = ramp_series(100, 1.0);
        let result = smooth_series(&series, 10.0).unwrap();
        // On a ramp the mean of data[i..i + 10] is i + 4.5.
        for (i, &v) in result.smoothed.x().iter().enumerate() {
            assert!(approx_eq(v, i as f64 + 4.5));
        }
        // The trimmed raw copy starts window/2 samples in.
        assert!(approx_eq(result.trimmed.x()[0], 5.0));
    }

    #[test]
    fn test_trim_keeps_time_aligned_with_smoothed() {
        let series = ramp_series(60, 2.0);
        let result = smooth_series(&series, 4.0).unwrap();
        // 4 s at 2 Hz is an 8-sample window; trim is 4 front, 3 back.
        assert_eq!(result.window, 8);
        assert_eq!(result.smoothed.len(), 60 - 7);
        assert!(approx_eq(result.smoothed.time()[0], 4.0 * 0.5));
        assert_eq!(result.smoothed.time(), result.trimmed.time());
    }

    #[test]
    fn test_odd_window_lengths_stay_consistent() {
        let series = ramp_series(50, 1.0);
        let result = smooth_series(&series, 11.0).unwrap();
        assert_eq!(result.window, 11);
        assert_eq!(result.smoothed.len(), 50 - 10);
        assert_eq!(result.trimmed.len(), result.smoothed.len());
    }

    #[test]
    fn test_smooth_series_carries_total_field() {
        let mut series = ramp_series(40, 1.0);
        series.compute_total_field();
        let result = smooth_series(&series, 5.0).unwrap();
        let f = result.smoothed.f().expect("total field should survive");
        assert_eq!(f.len(), result.smoothed.len());
    }

    #[test]
    fn test_smoothed_series_clones_independently() {
        let series = ramp_series(30, 1.0);
        let result = smooth_series(&series, 5.0).unwrap();
        let mut copy = result.clone();
        copy.smoothed.chop(1, 1).unwrap();
        assert_eq!(copy.window, result.window);
        assert_eq!(copy.smoothed.len(), result.smoothed.len() - 2);
        assert_eq!(result.smoothed.len(), result.trimmed.len());
    }

    #[test]
    fn test_smooth_series_rejects_bad_window_seconds() {
        let series = ramp_series(20, 1.0);
        assert!(smooth_series(&series, 0.0).is_err());
        assert!(smooth_series(&series, -3.0).is_err());
        assert!(smooth_series(&series, f64::NAN).is_err());
        assert!(smooth_series(&series, 21.0).is_err());
    }
}
