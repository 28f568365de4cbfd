//! Publish leaf: serialize records and hand them to an external transport

use crate::core::types::Data;
use crate::pipeline::payload::{PayloadEnvelope, ToPayload};
use crate::pipeline::{PipelineResult, Transform};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Publish failure, surfaced through the chain
///
/// Silent telemetry loss is worse than a halted chain, so publish errors
/// are never swallowed.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    PublishFailed { topic: String, reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::PublishFailed { topic, reason } => {
                write!(f, "publish to '{}' failed: {}", topic, reason)
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Externally supplied publish primitive (message bus, socket, ...)
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
}

/// Shared handle to a publisher; several publish filters typically share
/// one bus connection within a thread
pub type PublisherHandle = Rc<RefCell<dyn Publisher>>;

/// Leaf and pass-through stage: serializes each record through the
/// payload schema, publishes it, then forwards the original unchanged
pub struct PublishFilter<T> {
    topic: String,
    publisher: PublisherHandle,
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<T> PublishFilter<T> {
    pub fn new(topic: impl Into<String>, publisher: PublisherHandle) -> Self {
        Self {
            topic: topic.into(),
            publisher,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<T: ToPayload + Clone> Transform for PublishFilter<T> {
    type Input = T;
    type Output = T;

    fn apply(&mut self, input: &Data<T>) -> PipelineResult<Vec<Data<T>>> {
        let envelope = PayloadEnvelope::new(input.timestamp(), input.value().to_payload());
        let bytes = envelope
            .to_json()
            .map_err(|err| TransportError::PublishFailed {
                topic: self.topic.clone(),
                reason: format!("serialization: {}", err),
            })?;
        self.publisher.borrow_mut().publish(&self.topic, &bytes)?;
        Ok(vec![input.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector;
    use crate::pipeline::test_support::Recorder;
    use crate::pipeline::{FilterNode, Receive};

    /// Publisher that records every publish, optionally failing
    struct MemoryPublisher {
        published: Vec<(String, Vec<u8>)>,
        fail: bool,
    }

    impl MemoryPublisher {
        fn shared(fail: bool) -> Rc<RefCell<Self>> {
            Rc::new(RefCell::new(Self {
                published: Vec::new(),
                fail,
            }))
        }
    }

    impl Publisher for MemoryPublisher {
        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::PublishFailed {
                    topic: topic.to_string(),
                    reason: "connection lost".to_string(),
                });
            }
            self.published.push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_publishes_envelope_and_forwards_original() {
        let publisher = MemoryPublisher::shared(false);
        let order = Rc::new(RefCell::new(Vec::new()));
        let sink = Recorder::shared("sink", Rc::clone(&order));

        let mut node = FilterNode::new(PublishFilter::<Vector>::new(
            "sensors/acceleration",
            publisher.clone(),
        ));
        node.add(sink.clone());

        let sample = Data::new(Vector::new(0.0, 0.0, 9.81), 3.5);
        node.receive(sample).unwrap();

        // Forwarded unmodified
        assert_eq!(sink.borrow().received, vec![sample]);

        // Published through the schema
        let published = &publisher.borrow().published;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "sensors/acceleration");
        let envelope = PayloadEnvelope::from_json(&published[0].1).unwrap();
        assert_eq!(envelope.timestamp, 3.5);
        assert_eq!(envelope.record, Vector::new(0.0, 0.0, 9.81).to_payload());
    }

    #[test]
    fn test_publish_failure_surfaces_to_caller() {
        let publisher = MemoryPublisher::shared(true);
        let mut node = FilterNode::new(PublishFilter::<Vector>::new("sensors/a", publisher));
        let err = node.receive(Data::new(Vector::zero(), 0.0)).unwrap_err();
        assert!(err.to_string().contains("connection lost"));
    }

    #[test]
    fn test_leaf_without_downstream_is_fine() {
        let publisher = MemoryPublisher::shared(false);
        let mut node =
            FilterNode::new(PublishFilter::<Vector>::new("sensors/a", publisher.clone()));
        node.receive(Data::new(Vector::one(), 1.0)).unwrap();
        assert_eq!(publisher.borrow().published.len(), 1);
    }
}
