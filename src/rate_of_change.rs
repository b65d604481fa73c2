//! First-difference rate computation.
//!
//! `rate[i] = (data[i] − data[i−1]) × sample_rate`, in units per second,
//! since consecutive samples are `1/rate` seconds apart. The first and last
//! output samples are zero: no backward difference exists at the front, and
//! the last sample is left out of the sweep so both edges read as "no
//! change" rather than an extrapolated one.

use crate::types::{MagError, MagResult};

/// Per-sample rate of change of one channel, same length as the input.
pub fn rate_of_change(data: &[f64], sample_rate_hz: f64) -> MagResult<Vec<f64>> {
    if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
        return Err(MagError::InvalidParameter(format!(
            "sample rate must be positive and finite, got {sample_rate_hz}"
        )));
    }
    let mut rate = vec![0.0; data.len()];
    if data.len() < 3 {
        return Ok(rate);
    }
    for i in 1..data.len() - 1 {
        rate[i] = (data[i] - data[i - 1]) * sample_rate_hz;
    }
    Ok(rate)
}
