//! Residual metrics scoring how closely one series tracks another.
//!
//! [`residual`] is the scalar objective every calibration search minimizes:
//! per-axis mean absolute difference, combined as a root sum of squares.
//! It is deliberately not mean-centered, so a constant sensor bias shows up
//! in the score. [`range_of_difference`] is the complementary objective for
//! the scale search: blind to any constant offset, sensitive to amplitude
//! mismatch.

use crate::series::ThreeAxisSeries;
use crate::types::{MagError, MagResult};
use crate::vector_math::{Mat3, Vec3};

/// Per-axis residuals of a candidate series against a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResidual {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl FitResidual {
    /// Root sum of squares of the per-axis residuals.
    pub fn combined(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Mean absolute difference between two equal-length channels.
///
/// Pairs with a non-finite difference are excluded, so NaN gap fill does
/// not poison the score. Fails when the lengths differ or no finite pair
/// remains.
pub fn mean_absolute_difference(a: &[f64], b: &[f64]) -> MagResult<f64> {
    if a.len() != b.len() {
        return Err(MagError::LengthMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    let mut sum = 0.0;
    let mut count = 0usize;
    for (&p, &q) in a.iter().zip(b) {
        let d = q - p;
        if d.is_finite() {
            sum += d.abs();
            count += 1;
        }
    }
    if count == 0 {
        return Err(MagError::InvalidParameter(
            "no finite sample pairs to compare".to_string(),
        ));
    }
    Ok(sum / count as f64)
}

/// Spread of the pointwise difference, `max(b − a) − min(b − a)`.
///
/// Zero for any constant additive offset between the channels; grows with
/// amplitude mismatch. Non-finite differences are excluded.
pub fn range_of_difference(a: &[f64], b: &[f64]) -> MagResult<f64> {
    if a.len() != b.len() {
        return Err(MagError::LengthMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (&p, &q) in a.iter().zip(b) {
        let d = q - p;
        if d.is_finite() {
            lo = lo.min(d);
            hi = hi.max(d);
        }
    }
    if lo > hi {
        return Err(MagError::InvalidParameter(
            "no finite sample pairs to compare".to_string(),
        ));
    }
    Ok(hi - lo)
}

/// Residual of `series` against `reference` over the three field channels.
pub fn residual(series: &ThreeAxisSeries, reference: &ThreeAxisSeries) -> MagResult<FitResidual> {
    rotated_residual(series, reference, &Mat3::identity())
}

/// Residual of `series` rotated by `rotation` against `reference`, without
/// materializing the rotated series.
///
/// Samples where either side is non-finite are skipped whole (all three
/// axes together), so the per-axis means share one sample count.
pub fn rotated_residual(
    series: &ThreeAxisSeries,
    reference: &ThreeAxisSeries,
    rotation: &Mat3,
) -> MagResult<FitResidual> {
    if series.len() != reference.len() {
        return Err(MagError::LengthMismatch {
            expected: reference.len(),
            got: series.len(),
        });
    }
    let mut sums = [0.0; 3];
    let mut count = 0usize;
    for i in 0..series.len() {
        let v = Vec3::new(series.x()[i], series.y()[i], series.z()[i]);
        let r = Vec3::new(reference.x()[i], reference.y()[i], reference.z()[i]);
        let rotated = rotation.mul_vec_left(&v);
        let dx = r.x - rotated.x;
        let dy = r.y - rotated.y;
        let dz = r.z - rotated.z;
        if dx.is_finite() && dy.is_finite() && dz.is_finite() {
            sums[0] += dx.abs();
            sums[1] += dy.abs();
            sums[2] += dz.abs();
            count += 1;
        }
    }
    if count == 0 {
        return Err(MagError::InvalidParameter(
            "no finite sample pairs to compare".to_string(),
        ));
    }
    let c = count as f64;
    Ok(FitResidual {
        x: sums[0] / c,
        y: sums[1] / c,
        z: sums[2] / c,
    })
}
