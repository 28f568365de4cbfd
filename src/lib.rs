//! Rover Sensor Fusion
//!
//! Real-time sensor-fusion and position-estimation pipeline for a small
//! rover: rate-limited sensor providers feed push-based filter chains
//! that calibrate raw samples, integrate attitude, resolve UWB ranging
//! into positions, and publish results over a message bus.

pub mod attitude;
pub mod bus;
pub mod calibration;
pub mod core;
pub mod math;
pub mod pipeline;
pub mod positioning;
pub mod provider;
pub mod records;

// Re-export commonly used types
pub use attitude::{AttitudeAlgorithm, AttitudeError, ComplementaryAttitude};
pub use bus::{BusCallback, BusMessage, CallbackHandle, TopicDispatcher};
pub use calibration::{CalibrationError, RotationScaler};
pub use core::constants::STANDARD_GRAVITY;
pub use core::types::{
    AttitudeOutput, AttitudeStatus, Data, DwmDistanceAndPosition, DwmLocationResponse,
    DwmPosition, NineDofData, PositionInput,
};
pub use math::{Quaternion, Vector};
pub use pipeline::{
    AttitudeStage, AttitudeToPositionInput, CsvLogFilter, FilterHandle, FilterNode,
    LocationStage, PipelineError, PublishFilter, Publisher, Receive, RotationStage, Transform,
};
pub use positioning::Multilateration;
pub use provider::{DataProvider, ProviderError, RateLimitedProvider};
pub use records::{CsvRecord, RecordError};
