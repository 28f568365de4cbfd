//! Core data types and constants

pub mod constants;
pub mod types;

pub use constants::{STANDARD_GRAVITY, UNIT_NORM_TOLERANCE};
pub use types::{
    AttitudeOutput, AttitudeStatus, Data, DwmDistanceAndPosition, DwmLocationResponse,
    DwmPosition, NineDofData, PositionInput,
};
