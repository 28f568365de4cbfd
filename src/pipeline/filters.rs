//! Concrete pipeline stages

use crate::attitude::AttitudeAlgorithm;
use crate::calibration::RotationScaler;
use crate::core::constants::STANDARD_GRAVITY;
use crate::core::types::{AttitudeOutput, Data, DwmLocationResponse, NineDofData, PositionInput};
use crate::math::Vector;
use crate::pipeline::{PipelineResult, Transform};
use crate::positioning::Multilateration;
use crate::records::CsvRecord;
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

/// Attitude estimation stage
///
/// Wraps an [`AttitudeAlgorithm`] and emits one [`AttitudeOutput`] per
/// IMU sample, tagged with the algorithm's status flags for that step.
pub struct AttitudeStage {
    algorithm: Box<dyn AttitudeAlgorithm>,
}

impl AttitudeStage {
    pub fn new(algorithm: Box<dyn AttitudeAlgorithm>) -> Self {
        Self { algorithm }
    }

    pub fn algorithm_mut(&mut self) -> &mut dyn AttitudeAlgorithm {
        self.algorithm.as_mut()
    }
}

impl Transform for AttitudeStage {
    type Input = NineDofData;
    type Output = AttitudeOutput;

    fn apply(&mut self, input: &Data<NineDofData>) -> PipelineResult<Vec<Data<AttitudeOutput>>> {
        let sample = input.value();
        let attitude = self.algorithm.step(sample)?;
        let output = AttitudeOutput {
            attitude,
            acceleration: *sample.acceleration.value(),
            status: self.algorithm.status(),
        };
        Ok(vec![Data::new(output, input.timestamp())])
    }
}

/// Calibration stage: rotates vector samples into the body frame
pub struct RotationStage {
    scaler: RotationScaler,
}

impl RotationStage {
    pub fn new(scaler: RotationScaler) -> Self {
        Self { scaler }
    }
}

impl Transform for RotationStage {
    type Input = Vector;
    type Output = Vector;

    fn apply(&mut self, input: &Data<Vector>) -> PipelineResult<Vec<Data<Vector>>> {
        Ok(vec![self.scaler.scale(input)])
    }
}

/// Maps fused attitude outputs to position-estimation inputs
///
/// Owns exactly the attitude and acceleration fields: the acceleration is
/// rotated into the world frame and rescaled from g-normalised units to
/// m/s^2; position and velocity stay unset for later stages.
#[derive(Debug, Default)]
pub struct AttitudeToPositionInput;

impl AttitudeToPositionInput {
    pub fn new() -> Self {
        Self
    }
}

impl Transform for AttitudeToPositionInput {
    type Input = AttitudeOutput;
    type Output = PositionInput;

    fn apply(&mut self, input: &Data<AttitudeOutput>) -> PipelineResult<Vec<Data<PositionInput>>> {
        let output = input.map(|fused| PositionInput {
            attitude: Some(fused.attitude),
            acceleration: Some(fused.attitude.rotate(&fused.acceleration) * STANDARD_GRAVITY),
            velocity: None,
            position: None,
        });
        Ok(vec![output])
    }
}

/// Multilateration stage: resolves location responses into position
/// records, owning only the position field
///
/// Responses the solver cannot resolve (too few anchors and no prior)
/// produce no output.
pub struct LocationStage {
    solver: Multilateration,
}

impl LocationStage {
    pub fn new(solver: Multilateration) -> Self {
        Self { solver }
    }
}

impl Transform for LocationStage {
    type Input = DwmLocationResponse;
    type Output = PositionInput;

    fn apply(
        &mut self,
        input: &Data<DwmLocationResponse>,
    ) -> PipelineResult<Vec<Data<PositionInput>>> {
        match self.solver.solve(input.value()) {
            Some(resolved) => Ok(vec![Data::new(
                PositionInput {
                    position: Some(resolved.to_vector()),
                    ..Default::default()
                },
                input.timestamp(),
            )]),
            None => Ok(Vec::new()),
        }
    }
}

/// Destination for encoded log rows; file mechanics live outside the crate
pub trait RowSink {
    fn append(&mut self, row: &[String]) -> io::Result<()>;
}

/// Shared handle to a row sink
pub type RowSinkHandle = Rc<RefCell<dyn RowSink>>;

/// Logging leaf: encodes each record as a CSV row, appends it to a sink,
/// and forwards the original unchanged
pub struct CsvLogFilter<T> {
    sink: RowSinkHandle,
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<T> CsvLogFilter<T> {
    pub fn new(sink: RowSinkHandle) -> Self {
        Self {
            sink,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: CsvRecord + Clone> Transform for CsvLogFilter<T> {
    type Input = T;
    type Output = T;

    fn apply(&mut self, input: &Data<T>) -> PipelineResult<Vec<Data<T>>> {
        let row = input.value().to_row();
        self.sink.borrow_mut().append(&row)?;
        Ok(vec![input.clone()])
    }
}
