//! Immutable unit-quaternion rotation type

use crate::math::vector::Vector;
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Rotation quaternion with components (w, i, j, k)
///
/// Like [`Vector`], this is a value type: composition and normalisation
/// return new quaternions. Rotation operations assume unit norm; callers
/// integrating incremental rotations renormalise after every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub i: f64,
    pub j: f64,
    pub k: f64,
}

impl Quaternion {
    /// Create a quaternion from its components
    pub fn new(w: f64, i: f64, j: f64, k: f64) -> Self {
        Self { w, i, j, k }
    }

    /// The identity rotation
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Quaternion norm
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.i * self.i + self.j * self.j + self.k * self.k).sqrt()
    }

    /// Return this quaternion scaled to unit norm
    ///
    /// A degenerate (near-zero) quaternion collapses to the identity
    /// rather than dividing by zero.
    pub fn normalized(&self) -> Quaternion {
        let n = self.norm();
        if n < 1e-12 {
            return Quaternion::identity();
        }
        Quaternion::new(self.w / n, self.i / n, self.j / n, self.k / n)
    }

    /// Conjugate (inverse for unit quaternions)
    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(self.w, -self.i, -self.j, -self.k)
    }

    /// Rotate a vector by this quaternion
    pub fn rotate(&self, v: &Vector) -> Vector {
        // v' = v + 2w(u x v) + 2(u x (u x v)) with u the imaginary part
        let u = Vector::new(self.i, self.j, self.k);
        let t = u.cross(v) * 2.0;
        *v + t * self.w + u.cross(&t)
    }

    /// Build a rotation from Tait-Bryan angles (roll, pitch, yaw in radians)
    ///
    /// Intrinsic Z-Y-X convention: yaw about Z, then pitch about Y, then
    /// roll about X.
    pub fn from_tait_bryan(roll: f64, pitch: f64, yaw: f64) -> Quaternion {
        let (sr, cr) = (roll / 2.0).sin_cos();
        let (sp, cp) = (pitch / 2.0).sin_cos();
        let (sy, cy) = (yaw / 2.0).sin_cos();

        Quaternion::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// Decompose into Tait-Bryan angles (roll, pitch, yaw in radians)
    pub fn to_tait_bryan(&self) -> (f64, f64, f64) {
        let roll = (2.0 * (self.w * self.i + self.j * self.k))
            .atan2(1.0 - 2.0 * (self.i * self.i + self.j * self.j));
        // Clamp guards against |sin(pitch)| creeping past 1 numerically
        let pitch = (2.0 * (self.w * self.j - self.k * self.i))
            .clamp(-1.0, 1.0)
            .asin();
        let yaw = (2.0 * (self.w * self.k + self.i * self.j))
            .atan2(1.0 - 2.0 * (self.j * self.j + self.k * self.k));
        (roll, pitch, yaw)
    }

    /// Build the incremental rotation described by a small rotation vector
    /// (axis scaled by angle, radians)
    pub fn from_delta_angles(delta: &Vector) -> Quaternion {
        let angle = delta.norm();
        if angle < 1e-12 {
            // First-order expansion avoids dividing by a vanishing angle
            return Quaternion::new(1.0, delta.x / 2.0, delta.y / 2.0, delta.z / 2.0).normalized();
        }
        let half = angle / 2.0;
        let scale = half.sin() / angle;
        Quaternion::new(
            half.cos(),
            delta.x * scale,
            delta.y * scale,
            delta.z * scale,
        )
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    /// Hamilton product: `a * b` applies `b` first, then `a`
    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * rhs.w - self.i * rhs.i - self.j * rhs.j - self.k * rhs.k,
            self.w * rhs.i + self.i * rhs.w + self.j * rhs.k - self.k * rhs.j,
            self.w * rhs.j - self.i * rhs.k + self.j * rhs.w + self.k * rhs.i,
            self.w * rhs.k + self.i * rhs.j - self.j * rhs.i + self.k * rhs.w,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn test_identity_rotation_is_noop() {
        let vectors = [
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(-3.5, 2.25, 17.0),
            Vector::zero(),
        ];
        for v in vectors {
            assert_eq!(Quaternion::identity().rotate(&v), v);
        }
    }

    #[test]
    fn test_normalized_is_unit_norm() {
        let candidates = [
            Quaternion::new(1.0, 2.0, 3.0, 4.0),
            Quaternion::new(-0.3, 0.1, 0.0, 5.0),
            Quaternion::new(1e-3, 1e-3, 1e-3, 1e-3),
        ];
        for q in candidates {
            assert_relative_eq!(q.normalized().norm(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_half_turn_about_y() {
        let q = Quaternion::new(0.0, 0.0, 1.0, 0.0);
        let rotated = q.rotate(&Vector::new(3.0, 2.0, 1.0));
        assert_relative_eq!(rotated.x, -3.0, epsilon = 1e-12);
        assert_relative_eq!(rotated.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(rotated.z, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tait_bryan_round_trip() {
        let q = Quaternion::from_tait_bryan(0.1, -0.4, FRAC_PI_4);
        let (roll, pitch, yaw) = q.to_tait_bryan();
        assert_relative_eq!(roll, 0.1, epsilon = 1e-12);
        assert_relative_eq!(pitch, -0.4, epsilon = 1e-12);
        assert_relative_eq!(yaw, FRAC_PI_4, epsilon = 1e-12);
    }

    #[test]
    fn test_composition_matches_sequential_rotation() {
        let yaw90 = Quaternion::from_tait_bryan(0.0, 0.0, FRAC_PI_2);
        let roll90 = Quaternion::from_tait_bryan(FRAC_PI_2, 0.0, 0.0);
        let combined = yaw90 * roll90;

        let v = Vector::new(0.0, 1.0, 0.0);
        let sequential = yaw90.rotate(&roll90.rotate(&v));
        let direct = combined.rotate(&v);
        assert_relative_eq!(direct.x, sequential.x, epsilon = 1e-12);
        assert_relative_eq!(direct.y, sequential.y, epsilon = 1e-12);
        assert_relative_eq!(direct.z, sequential.z, epsilon = 1e-12);
    }

    #[test]
    fn test_delta_angles_small_rotation() {
        let delta = Vector::new(0.0, 0.0, 1e-4);
        let q = Quaternion::from_delta_angles(&delta);
        assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-9);
        let (_, _, yaw) = q.to_tait_bryan();
        assert_relative_eq!(yaw, 1e-4, epsilon = 1e-10);
    }

    #[test]
    fn test_delta_angles_finite_rotation() {
        let q = Quaternion::from_delta_angles(&Vector::new(0.0, FRAC_PI_2, 0.0));
        let rotated = q.rotate(&Vector::new(1.0, 0.0, 0.0));
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(rotated.z, -1.0, epsilon = 1e-12);
    }
}
