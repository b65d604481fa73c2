//! Vector and matrix primitives for sensor-orientation geometry.
//!
//! Everything in the calibration path reduces to small fixed-size linear
//! algebra: unit direction vectors, 3x3 rotation matrices, and the Rodrigues
//! construction that aligns one measured direction with a desired one.
//! `Mat3` is row-major. Rotations built here follow the row-vector
//! convention used throughout the crate: a sample `v` measured in the
//! sensor frame moves to the reference frame as `m.mul_vec_left(&v)`,
//! i.e. `v · M`.

use crate::types::{MagError, MagResult};

/// Below this |sin phi| two directions are treated as colinear and the
/// Rodrigues denominator is no longer trustworthy.
const COLINEAR_SIN_LIMIT: f64 = 1e-12;

/// Vector norms below this are indistinguishable from zero.
const ZERO_NORM_LIMIT: f64 = 1e-15;

/// A 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Euclidean magnitude.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction.
    ///
    /// Fails with [`MagError::DegenerateVector`] when the norm is zero or
    /// non-finite, so downstream rotation math never divides by it.
    pub fn normalized(&self) -> MagResult<Vec3> {
        let m = self.magnitude();
        if m < ZERO_NORM_LIMIT || !m.is_finite() {
            return Err(MagError::DegenerateVector { norm: m });
        }
        Ok(Self::new(self.x / m, self.y / m, self.z / m))
    }

    /// Dot product.
    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product (right-handed).
    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Component-wise subtraction `self - other`.
    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Component-wise addition.
    pub fn add(&self, other: &Vec3) -> Vec3 {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Scalar multiple.
    pub fn scale(&self, s: f64) -> Vec3 {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

/// A 3x3 matrix, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [[f64; 3]; 3],
}

impl Mat3 {
    /// Identity matrix.
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Diagonal matrix from three entries.
    pub fn diagonal(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            m: [[dx, 0.0, 0.0], [0.0, dy, 0.0], [0.0, 0.0, dz]],
        }
    }

    /// Skew-symmetric cross-product matrix `K` of `v`, so that
    /// `K · u = v × u` for any `u`.
    pub fn skew(v: &Vec3) -> Self {
        Self {
            m: [
                [0.0, -v.z, v.y],
                [v.z, 0.0, -v.x],
                [-v.y, v.x, 0.0],
            ],
        }
    }

    /// Matrix-vector product `M · v` (column convention).
    pub fn mul_vec(&self, v: &Vec3) -> Vec3 {
        Vec3::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z,
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z,
            self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z,
        )
    }

    /// Row-vector product `v · M`, equal to `Mᵀ · v`.
    ///
    /// This is how measured samples are rotated throughout the crate: for a
    /// matrix from [`rotation_between`], `v · M` carries a sample from the
    /// sensor's current frame into the desired frame.
    pub fn mul_vec_left(&self, v: &Vec3) -> Vec3 {
        Vec3::new(
            self.m[0][0] * v.x + self.m[1][0] * v.y + self.m[2][0] * v.z,
            self.m[0][1] * v.x + self.m[1][1] * v.y + self.m[2][1] * v.z,
            self.m[0][2] * v.x + self.m[1][2] * v.y + self.m[2][2] * v.z,
        )
    }

    /// Matrix product `self · other`.
    pub fn mul_mat(&self, other: &Mat3) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                for k in 0..3 {
                    *cell += self.m[i][k] * other.m[k][j];
                }
            }
        }
        Mat3 { m: out }
    }

    /// Element-wise sum `self + other`.
    pub fn add_mat(&self, other: &Mat3) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.m[i][j] + other.m[i][j];
            }
        }
        Mat3 { m: out }
    }

    /// Every element multiplied by `s`.
    pub fn scale(&self, s: f64) -> Mat3 {
        let mut out = self.m;
        for row in out.iter_mut() {
            for cell in row.iter_mut() {
                *cell *= s;
            }
        }
        Mat3 { m: out }
    }

    /// Transpose.
    pub fn transpose(&self) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in self.m.iter().enumerate() {
            for (j, &cell) in row.iter().enumerate() {
                out[j][i] = cell;
            }
        }
        Mat3 { m: out }
    }

    /// Determinant (+1 for a proper rotation).
    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Mat3 {
        let (s, c) = angle.sin_cos();
        Mat3 {
            m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Mat3 {
        let (s, c) = angle.sin_cos();
        Mat3 {
            m: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Mat3 {
        let (s, c) = angle.sin_cos();
        Mat3 {
            m: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        }
    }

    /// Half-turn (180 degree) rotation about `axis`, `2·ââᵀ − I`.
    ///
    /// This is the fallback for antiparallel alignment: it carries `v` onto
    /// `−v` for any `v` perpendicular to the axis.
    pub fn half_turn(axis: &Vec3) -> MagResult<Mat3> {
        let a = axis.normalized()?;
        let c = [a.x, a.y, a.z];
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = 2.0 * c[i] * c[j] - if i == j { 1.0 } else { 0.0 };
            }
        }
        Ok(Mat3 { m: out })
    }

    /// Composed rotation `Rz(yaw) · Ry(pitch) · Rx(roll)`, expanded in
    /// closed form.
    pub fn from_euler_zyx(yaw: f64, pitch: f64, roll: f64) -> Mat3 {
        let (sy, cy) = yaw.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        let (sr, cr) = roll.sin_cos();
        Mat3 {
            m: [
                [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
                [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
                [-sp, cp * sr, cp * cr],
            ],
        }
    }

    /// Frobenius distance to another matrix. Used by tests and diagnostics
    /// to bound orthonormality error.
    pub fn frobenius_distance(&self, other: &Mat3) -> f64 {
        let mut sum = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                let d = self.m[i][j] - other.m[i][j];
                sum += d * d;
            }
        }
        sum.sqrt()
    }
}

/// Any unit vector perpendicular to `v`, built by crossing with the basis
/// axis `v` is least aligned with.
pub fn any_perpendicular(v: &Vec3) -> MagResult<Vec3> {
    let u = v.normalized()?;
    let basis = if u.x.abs() <= u.y.abs() && u.x.abs() <= u.z.abs() {
        Vec3::new(1.0, 0.0, 0.0)
    } else if u.y.abs() <= u.z.abs() {
        Vec3::new(0.0, 1.0, 0.0)
    } else {
        Vec3::new(0.0, 0.0, 1.0)
    };
    u.cross(&basis).normalized()
}

/// Unit direction on the sphere for a declination (east of geographic
/// north, about Z) and inclination (downward dip) in radians.
pub fn direction_from_angles(declination: f64, inclination: f64) -> Vec3 {
    let (sd, cd) = declination.sin_cos();
    let (si, ci) = inclination.sin_cos();
    Vec3::new(ci * cd, ci * sd, si)
}

/// Rotation matrix for an explicit angle triple, composed as
/// `Rz(declination) · Ry(inclination) · Rx(ancillary)`.
pub fn rotation_from_angles(declination: f64, inclination: f64, ancillary: f64) -> Mat3 {
    Mat3::from_euler_zyx(declination, inclination, ancillary)
}

/// Rodrigues rotation aligning `current` with `desired`.
///
/// Both inputs are normalized first; either being zero or non-finite fails
/// with [`MagError::DegenerateVector`]. For unit directions `a = desired`,
/// `b = current` the matrix is
///
/// ```text
/// R = I + K + K² · (1 − cos φ) / sin² φ,   K = skew(a × b)
/// ```
///
/// so that `R` maps `a` onto `b` in the column convention, and therefore
/// `b.mul_vec_left(&R)` recovers `a`: row-multiplying measured samples by
/// `R` moves them from the current frame to the desired frame.
///
/// When the directions are already aligned (`sin φ ≈ 0`, `cos φ > 0`) the
/// formula's limit is the identity, which is returned. Antiparallel inputs
/// have no unique rotation axis and fail with
/// [`MagError::DegenerateRotation`].
pub fn rotation_between(desired: &Vec3, current: &Vec3) -> MagResult<Mat3> {
    let a = desired.normalized()?;
    let b = current.normalized()?;
    let cross = a.cross(&b);
    let sin_phi = cross.magnitude();
    let cos_phi = a.dot(&b);

    if sin_phi < COLINEAR_SIN_LIMIT {
        if cos_phi > 0.0 {
            return Ok(Mat3::identity());
        }
        return Err(MagError::DegenerateRotation { sin_phi });
    }

    let k = Mat3::skew(&cross);
    let k2 = k.mul_mat(&k);
    let correction = k2.scale((1.0 - cos_phi) / (sin_phi * sin_phi));
    Ok(Mat3::identity().add_mat(&k).add_mat(&correction))
}

/// How the caller describes the orientation correction to apply.
///
/// Either a measured/desired direction pair (the rotation is solved with
/// [`rotation_between`]) or an explicit angle triple (assembled with
/// [`rotation_from_angles`]). Replaces the older habit of passing sentinel
/// angle values to mean "use the vectors instead".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationSpec {
    /// Align a measured direction with a reference direction.
    Vectors { current: Vec3, desired: Vec3 },
    /// Rotate by explicit declination/inclination/ancillary angles, radians.
    Angles {
        declination: f64,
        inclination: f64,
        ancillary: f64,
    },
}

impl OrientationSpec {
    /// Build the rotation matrix this specification describes.
    pub fn rotation(&self) -> MagResult<Mat3> {
        match self {
            OrientationSpec::Vectors { current, desired } => rotation_between(desired, current),
            OrientationSpec::Angles {
                declination,
                inclination,
                ancillary,
            } => Ok(rotation_from_angles(*declination, *inclination, *ancillary)),
        }
    }
}
