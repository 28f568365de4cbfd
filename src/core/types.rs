//! Core record types flowing through the pipeline

use crate::math::{Quaternion, Vector};
use serde::{Deserialize, Serialize};

/// A value paired with the monotonic timestamp (seconds) it was sampled
/// or produced at
///
/// Instances are created once, at sampling or transform time, and are
/// immutable afterwards. Equality covers both the value and the timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Data<T> {
    value: T,
    timestamp: f64,
}

impl<T> Data<T> {
    /// Wrap a value with its sampling timestamp
    pub fn new(value: T, timestamp: f64) -> Self {
        Self { value, timestamp }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Transform the value, keeping the original timestamp
    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> Data<U> {
        Data::new(f(&self.value), self.timestamp)
    }

    /// Consume the wrapper, yielding the value
    pub fn into_value(self) -> T {
        self.value
    }
}

/// One 9-degree-of-freedom IMU sample instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NineDofData {
    /// Gyroscope reading, rad/s per axis
    pub angular_velocity: Data<Vector>,
    /// Accelerometer reading, normalised to g
    pub acceleration: Data<Vector>,
    /// Magnetometer reading, arbitrary consistent units
    pub magnetic_field: Data<Vector>,
}

/// Status flags attached to each fused attitude output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttitudeStatus(u32);

impl AttitudeStatus {
    /// Orientation was initialised from an absolute gravity/compass fix
    pub const INITIALISED: AttitudeStatus = AttitudeStatus(1);
    /// Magnetometer contributed to the heading estimate
    pub const MAGNETOMETER_USED: AttitudeStatus = AttitudeStatus(1 << 1);
    /// Accelerometer/magnetometer correction was blended in this step
    pub const CORRECTION_APPLIED: AttitudeStatus = AttitudeStatus(1 << 2);

    pub fn empty() -> Self {
        AttitudeStatus(0)
    }

    pub fn contains(&self, flag: AttitudeStatus) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn with(self, flag: AttitudeStatus) -> Self {
        AttitudeStatus(self.0 | flag.0)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// One fused attitude output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeOutput {
    /// Fused orientation, unit norm
    pub attitude: Quaternion,
    /// Accelerometer reading at the fused instant, still in sensor frame
    /// and g-normalised units
    pub acceleration: Vector,
    /// Fusion status flags
    pub status: AttitudeStatus,
}

/// Incrementally filled position-estimation record
///
/// Each pipeline stage owns a disjoint subset of these fields; a stage
/// must carry fields it does not produce through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionInput {
    pub attitude: Option<Quaternion>,
    /// World-frame acceleration, m/s^2
    pub acceleration: Option<Vector>,
    /// World-frame velocity, m/s
    pub velocity: Option<Vector>,
    /// World-frame position, mm
    pub position: Option<Vector>,
}

/// A reported 3D position with a confidence weight
///
/// Coordinates are millimetres, matching the ranging hardware's native
/// unit. Higher quality factor means higher confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DwmPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub quality_factor: u8,
}

impl DwmPosition {
    pub fn new(x: f64, y: f64, z: f64, quality_factor: u8) -> Self {
        Self {
            x,
            y,
            z,
            quality_factor,
        }
    }

    /// Coordinates as a plain vector, dropping the quality factor
    pub fn to_vector(&self) -> Vector {
        Vector::new(self.x, self.y, self.z)
    }
}

/// One anchor's range report: where the anchor is and how far away the
/// tag measured it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwmDistanceAndPosition {
    /// Anchor id in display byte order (e.g. "ABCD")
    pub anchor_id: String,
    pub anchor_address: u32,
    pub quality_factor: u8,
    /// Measured tag-to-anchor distance, mm
    pub distance_mm: f64,
    /// Anchor's surveyed position
    pub anchor_position: DwmPosition,
}

/// A full location report from the ranging module: the module's own tag
/// position estimate plus one entry per visible anchor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DwmLocationResponse {
    pub position: Option<DwmPosition>,
    pub anchors: Vec<DwmDistanceAndPosition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_equality_covers_timestamp() {
        let a = Data::new(Vector::one(), 1.0);
        let b = Data::new(Vector::one(), 1.0);
        let c = Data::new(Vector::one(), 2.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_data_map_preserves_timestamp() {
        let sample = Data::new(Vector::new(1.0, 2.0, 3.0), 42.5);
        let doubled = sample.map(|v| *v * 2.0);
        assert_eq!(doubled.timestamp(), 42.5);
        assert_eq!(*doubled.value(), Vector::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_status_flags() {
        let status = AttitudeStatus::empty()
            .with(AttitudeStatus::INITIALISED)
            .with(AttitudeStatus::MAGNETOMETER_USED);
        assert!(status.contains(AttitudeStatus::INITIALISED));
        assert!(status.contains(AttitudeStatus::MAGNETOMETER_USED));
        assert!(!status.contains(AttitudeStatus::CORRECTION_APPLIED));
        assert_eq!(status.bits(), 0b11);
    }

    #[test]
    fn test_position_input_defaults_empty() {
        let input = PositionInput::default();
        assert!(input.attitude.is_none());
        assert!(input.position.is_none());
    }
}
