/// Standard gravity, m/s^2. Rescales g-normalised accelerometer output.
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Tolerance for unit-norm quaternion checks
pub const UNIT_NORM_TOLERANCE: f64 = 1e-9;
