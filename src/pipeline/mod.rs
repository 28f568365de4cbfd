//! Push-based data-filter pipeline
//!
//! A chain is a set of [`FilterNode`]s wired together with shared handles.
//! `receive()` calls run synchronously down the chain on the caller's
//! thread: there is no queueing between stages, so back-pressure is
//! implicit and errors from any stage (including transport failures at
//! the leaves) propagate back to the producer.
//!
//! Each node instance is owned by exactly one driving thread; handles are
//! `Rc`-based and must not cross threads.

pub mod filters;
pub mod payload;
pub mod publish;

pub use filters::{
    AttitudeStage, AttitudeToPositionInput, CsvLogFilter, LocationStage, RotationStage, RowSink,
    RowSinkHandle,
};
pub use payload::{PayloadEnvelope, RecordPayload, ToPayload, PAYLOAD_SCHEMA_VERSION};
pub use publish::{PublishFilter, Publisher, TransportError};

use crate::attitude::AttitudeError;
use crate::core::types::Data;
use crate::records::RecordError;
use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::Rc;

/// Result type for pipeline stages
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced through a filter chain
#[derive(Debug)]
pub enum PipelineError {
    /// Attitude integration rejected a sample
    Attitude(AttitudeError),
    /// A publish leaf failed to ship a record
    Transport(TransportError),
    /// A logging leaf failed to encode a record
    Record(RecordError),
    /// A logging leaf failed to write a row
    Io(io::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Attitude(err) => write!(f, "attitude stage: {}", err),
            PipelineError::Transport(err) => write!(f, "transport: {}", err),
            PipelineError::Record(err) => write!(f, "record encoding: {}", err),
            PipelineError::Io(err) => write!(f, "log sink: {}", err),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Attitude(err) => Some(err),
            PipelineError::Transport(err) => Some(err),
            PipelineError::Record(err) => Some(err),
            PipelineError::Io(err) => Some(err),
        }
    }
}

impl From<AttitudeError> for PipelineError {
    fn from(err: AttitudeError) -> Self {
        PipelineError::Attitude(err)
    }
}

impl From<TransportError> for PipelineError {
    fn from(err: TransportError) -> Self {
        PipelineError::Transport(err)
    }
}

impl From<RecordError> for PipelineError {
    fn from(err: RecordError) -> Self {
        PipelineError::Record(err)
    }
}

impl From<io::Error> for PipelineError {
    fn from(err: io::Error) -> Self {
        PipelineError::Io(err)
    }
}

/// Consumer side of a chain edge
pub trait Receive<T> {
    /// Accept one record pushed from upstream
    fn receive(&mut self, data: Data<T>) -> PipelineResult<()>;
}

/// Shared handle to a downstream consumer
///
/// Handles may be registered under several upstream nodes, which makes
/// chains DAGs rather than strict trees.
pub type FilterHandle<T> = Rc<RefCell<dyn Receive<T>>>;

/// A stage's data transformation, with explicit input and output types
///
/// One input may produce zero, one, or many outputs. Transforms may carry
/// state (integrators, calibration) and may perform side effects
/// (publishing, logging) before the outputs fan out.
pub trait Transform {
    type Input;
    type Output;

    fn apply(&mut self, input: &Data<Self::Input>) -> PipelineResult<Vec<Data<Self::Output>>>;
}

/// Pipeline node: a [`Transform`] plus downstream fan-out
pub struct FilterNode<F: Transform> {
    transform: F,
    downstream: Vec<FilterHandle<F::Output>>,
}

impl<F: Transform> FilterNode<F> {
    pub fn new(transform: F) -> Self {
        Self {
            transform,
            downstream: Vec::new(),
        }
    }

    /// Register a downstream consumer of this node's output
    ///
    /// Downstream filters are invoked synchronously, in registration
    /// order, once per produced output. Registering a node downstream of
    /// itself (directly or through a cycle) is a caller error and will
    /// panic on re-entrant borrow when data flows.
    pub fn add(&mut self, downstream: FilterHandle<F::Output>) {
        self.downstream.push(downstream);
    }

    /// Access the wrapped transform
    pub fn transform(&self) -> &F {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut F {
        &mut self.transform
    }

    /// Wrap this node in a shareable handle
    pub fn into_handle(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }
}

impl<F: Transform> Receive<F::Input> for FilterNode<F>
where
    F::Output: Clone,
{
    fn receive(&mut self, data: Data<F::Input>) -> PipelineResult<()> {
        for output in self.transform.apply(&data)? {
            for downstream in &self.downstream {
                downstream.borrow_mut().receive(output.clone())?;
            }
        }
        Ok(())
    }
}
