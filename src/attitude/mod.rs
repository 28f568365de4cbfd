//! Attitude estimation from 9-DoF IMU samples

pub mod complementary;

pub use complementary::ComplementaryAttitude;

use crate::core::types::{AttitudeStatus, NineDofData};
use crate::math::Quaternion;
use std::fmt;

/// Result type for attitude estimation
pub type AttitudeResult<T> = Result<T, AttitudeError>;

/// Attitude estimation errors
#[derive(Debug, Clone, PartialEq)]
pub enum AttitudeError {
    /// Integration was given a sample that does not advance time.
    /// dt would be zero or negative, so the step is undefined; this is a
    /// caller error and is propagated rather than clamped.
    NonMonotonicTimestamp { previous: f64, current: f64 },
}

impl fmt::Display for AttitudeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttitudeError::NonMonotonicTimestamp { previous, current } => {
                write!(
                    f,
                    "non-monotonic sample timestamp: {} after {}",
                    current, previous
                )
            }
        }
    }
}

impl std::error::Error for AttitudeError {}

/// Fusion algorithm turning IMU samples into an orientation estimate
///
/// Implementations are stateful: before the first sample (or after
/// `reset()`) they are uninitialised and derive an absolute orientation
/// from the first sample; afterwards they track incrementally.
pub trait AttitudeAlgorithm {
    /// Fold one IMU sample into the orientation estimate
    ///
    /// The returned quaternion is always unit norm.
    fn step(&mut self, sample: &NineDofData) -> AttitudeResult<Quaternion>;

    /// Discard all state and return to the uninitialised condition
    fn reset(&mut self);

    /// Seed the estimate with a known orientation at a given timestamp
    fn initialise(&mut self, attitude: Quaternion, timestamp: f64);

    /// Status flags describing the most recent `step()`
    fn status(&self) -> AttitudeStatus;
}
