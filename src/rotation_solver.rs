//! Applies orientation corrections to whole series.
//!
//! Three application modes mirror the ways a correction is parameterized:
//! one rotation built from batch mean directions, one rotation per sample
//! for orientations that drift, or a fixed angle triplet. All of them
//! multiply samples as row vectors, `v · R`, and recompute the total-field
//! channel from the rotated components when one is carried.

use tracing::warn;

use crate::series::ThreeAxisSeries;
use crate::types::{MagError, MagResult};
use crate::vector_math::{any_perpendicular, rotation_between, rotation_from_angles, Mat3, Vec3};

/// What the series should be rotated to line up with.
#[derive(Debug, Clone, Copy)]
pub enum RotationTarget<'a> {
    /// A reference series in the trusted orientation.
    Reference(&'a ThreeAxisSeries),
    /// A fixed field direction, e.g. from a declination/inclination pair.
    Direction(Vec3),
}

/// Off-diagonal entries of one per-sample rotation, in the order they are
/// persisted to the calibration artifact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationTraceRow {
    pub r01: f64,
    pub r02: f64,
    pub r12: f64,
}

impl RotationTraceRow {
    fn from_matrix(m: &Mat3) -> Self {
        Self {
            r01: m.m[0][1],
            r02: m.m[0][2],
            r12: m.m[1][2],
        }
    }

    fn nan() -> Self {
        Self {
            r01: f64::NAN,
            r02: f64::NAN,
            r12: f64::NAN,
        }
    }
}

/// Rotation aligning `current` with `desired`, falling back to a half turn
/// about a perpendicular axis when the directions are antiparallel.
fn aligning_rotation(desired: &Vec3, current: &Vec3) -> MagResult<Mat3> {
    match rotation_between(desired, current) {
        Err(MagError::DegenerateRotation { .. }) => {
            warn!("antiparallel alignment, substituting a half turn");
            Mat3::half_turn(&any_perpendicular(current)?)
        }
        other => other,
    }
}

fn rotate_all(series: &mut ThreeAxisSeries, rotation: &Mat3) {
    for i in 0..series.len() {
        let v = Vec3::new(series.x[i], series.y[i], series.z[i]);
        let w = rotation.mul_vec_left(&v);
        series.x[i] = w.x;
        series.y[i] = w.y;
        series.z[i] = w.z;
    }
}

/// Rotate every sample by the single rotation that aligns the series mean
/// vector with the target, returning the matrix that was applied.
///
/// The length and time axis are untouched; only the three field channels
/// turn, and the total field (if present) is recomputed as the per-sample
/// vector norm.
pub fn apply_batch_rotation(
    series: &mut ThreeAxisSeries,
    target: &RotationTarget<'_>,
) -> MagResult<Mat3> {
    let m = series.mean_vector()?;
    let current = Vec3::new(m[0], m[1], m[2]);
    let desired = match target {
        RotationTarget::Reference(reference) => {
            let r = reference.mean_vector()?;
            Vec3::new(r[0], r[1], r[2])
        }
        RotationTarget::Direction(d) => *d,
    };
    let rotation = aligning_rotation(&desired, &current)?;
    rotate_all(series, &rotation);
    if series.f.is_some() {
        series.compute_total_field();
    }
    Ok(rotation)
}

/// Rotate each sample by its own alignment rotation, for sensors whose
/// orientation drifts within the window.
///
/// Against a [`RotationTarget::Reference`] the lengths must match. Samples
/// where either side is non-finite are left untouched and recorded as NaN
/// trace rows; everything else contributes one row of rotation-matrix
/// off-diagonals to the returned trace, one row per sample.
pub fn apply_per_sample_rotation(
    series: &mut ThreeAxisSeries,
    target: &RotationTarget<'_>,
) -> MagResult<Vec<RotationTraceRow>> {
    if let RotationTarget::Reference(reference) = target {
        if reference.len() != series.len() {
            return Err(MagError::LengthMismatch {
                expected: series.len(),
                got: reference.len(),
            });
        }
    }
    let mut trace = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        let v = Vec3::new(series.x[i], series.y[i], series.z[i]);
        let desired = match target {
            RotationTarget::Reference(reference) => {
                Vec3::new(reference.x()[i], reference.y()[i], reference.z()[i])
            }
            RotationTarget::Direction(d) => *d,
        };
        let usable = v.x.is_finite()
            && v.y.is_finite()
            && v.z.is_finite()
            && desired.x.is_finite()
            && desired.y.is_finite()
            && desired.z.is_finite();
        if !usable {
            trace.push(RotationTraceRow::nan());
            continue;
        }
        let rotation = aligning_rotation(&desired, &v)?;
        let w = rotation.mul_vec_left(&v);
        series.x[i] = w.x;
        series.y[i] = w.y;
        series.z[i] = w.z;
        trace.push(RotationTraceRow::from_matrix(&rotation));
    }
    if series.f.is_some() {
        series.compute_total_field();
    }
    Ok(trace)
}

/// Rotate every sample by the fixed `Rz·Ry·Rx` composition of the given
/// angles, returning the matrix that was applied.
pub fn apply_angle_rotation(
    series: &mut ThreeAxisSeries,
    declination: f64,
    inclination: f64,
    ancillary: f64,
) -> Mat3 {
    let rotation = rotation_from_angles(declination, inclination, ancillary);
    rotate_all(series, &rotation);
    if series.f.is_some() {
        series.compute_total_field();
    }
    rotation
}
