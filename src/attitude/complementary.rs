//! Complementary attitude filter
//!
//! Gyroscope integration carries the orientation between samples; the
//! accelerometer and magnetometer supply the absolute reference that the
//! gyro alone cannot recover (heading and inclination). On the first
//! sample the absolute reference is adopted outright; on every later
//! sample the integrated estimate is nudged toward it by a small
//! configurable gain, which bounds drift without letting accelerometer
//! noise dominate.

use crate::attitude::{AttitudeAlgorithm, AttitudeError, AttitudeResult};
use crate::core::types::{AttitudeStatus, NineDofData};
use crate::math::{Quaternion, Vector};

/// Magnetometer readings below this norm are treated as absent
const MIN_FIELD_NORM: f64 = 1e-9;

/// Complementary gyro-integration attitude filter
#[derive(Debug, Clone)]
pub struct ComplementaryAttitude {
    /// Fraction of the absolute accel/mag orientation blended into the
    /// integrated estimate each step. Zero disables the correction.
    correction_gain: f64,
    /// Current orientation and the timestamp it applies to; `None` until
    /// the first sample or external initialisation
    state: Option<(Quaternion, f64)>,
    status: AttitudeStatus,
}

impl Default for ComplementaryAttitude {
    fn default() -> Self {
        Self::new(0.02)
    }
}

impl ComplementaryAttitude {
    /// Create a filter with the given accel/mag correction gain
    pub fn new(correction_gain: f64) -> Self {
        Self {
            correction_gain,
            state: None,
            status: AttitudeStatus::empty(),
        }
    }

    /// Current orientation estimate, if tracking
    pub fn attitude(&self) -> Option<Quaternion> {
        self.state.map(|(q, _)| q)
    }

    /// Absolute orientation from gravity and the magnetic field
    ///
    /// Roll and pitch come from the gravity direction; yaw from the
    /// tilt-compensated compass. Returns the orientation and whether the
    /// magnetometer contributed.
    fn absolute_orientation(acceleration: &Vector, magnetic_field: &Vector) -> (Quaternion, bool) {
        let roll = acceleration.y.atan2(acceleration.z);
        let pitch = (-acceleration.x)
            .atan2((acceleration.y * acceleration.y + acceleration.z * acceleration.z).sqrt());

        let (yaw, mag_used) = if magnetic_field.norm() > MIN_FIELD_NORM {
            let (sr, cr) = roll.sin_cos();
            let (sp, cp) = pitch.sin_cos();
            let mx = magnetic_field.x * cp + magnetic_field.z * sp;
            let my =
                magnetic_field.x * sr * sp + magnetic_field.y * cr - magnetic_field.z * sr * cp;
            ((-my).atan2(mx), true)
        } else {
            (0.0, false)
        };

        (Quaternion::from_tait_bryan(roll, pitch, yaw), mag_used)
    }

    /// Blend `from` toward `to` by `alpha`, respecting the quaternion
    /// double cover
    fn blend(from: &Quaternion, to: &Quaternion, alpha: f64) -> Quaternion {
        let dot = from.w * to.w + from.i * to.i + from.j * to.j + from.k * to.k;
        let sign = if dot < 0.0 { -1.0 } else { 1.0 };
        Quaternion::new(
            from.w + (sign * to.w - from.w) * alpha,
            from.i + (sign * to.i - from.i) * alpha,
            from.j + (sign * to.j - from.j) * alpha,
            from.k + (sign * to.k - from.k) * alpha,
        )
        .normalized()
    }
}

impl AttitudeAlgorithm for ComplementaryAttitude {
    fn step(&mut self, sample: &NineDofData) -> AttitudeResult<Quaternion> {
        // The gyroscope timestamp drives integration time
        let timestamp = sample.angular_velocity.timestamp();

        let (previous, previous_timestamp) = match self.state {
            None => {
                let (attitude, mag_used) = Self::absolute_orientation(
                    sample.acceleration.value(),
                    sample.magnetic_field.value(),
                );
                let mut status = AttitudeStatus::empty().with(AttitudeStatus::INITIALISED);
                if mag_used {
                    status = status.with(AttitudeStatus::MAGNETOMETER_USED);
                }
                self.status = status;
                self.state = Some((attitude, timestamp));
                return Ok(attitude);
            }
            Some(state) => state,
        };

        let dt = timestamp - previous_timestamp;
        if dt <= 0.0 {
            return Err(AttitudeError::NonMonotonicTimestamp {
                previous: previous_timestamp,
                current: timestamp,
            });
        }

        let delta_angles = *sample.angular_velocity.value() * dt;
        let delta = Quaternion::from_delta_angles(&delta_angles);
        let mut attitude = (previous * delta).normalized();
        let mut status = AttitudeStatus::empty();

        if self.correction_gain > 0.0 {
            let (reference, mag_used) = Self::absolute_orientation(
                sample.acceleration.value(),
                sample.magnetic_field.value(),
            );
            attitude = Self::blend(&attitude, &reference, self.correction_gain);
            status = status.with(AttitudeStatus::CORRECTION_APPLIED);
            if mag_used {
                status = status.with(AttitudeStatus::MAGNETOMETER_USED);
            }
        }

        self.status = status;
        self.state = Some((attitude, timestamp));
        Ok(attitude)
    }

    fn reset(&mut self) {
        self.state = None;
        self.status = AttitudeStatus::empty();
    }

    fn initialise(&mut self, attitude: Quaternion, timestamp: f64) {
        self.state = Some((attitude.normalized(), timestamp));
        self.status = AttitudeStatus::empty().with(AttitudeStatus::INITIALISED);
    }

    fn status(&self) -> AttitudeStatus {
        self.status
    }
}
