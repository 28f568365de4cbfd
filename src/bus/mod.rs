//! Inbound message-bus dispatch
//!
//! Topics are hierarchical strings joined by `/`. Subscriptions match
//! against patterns that may contain `+` (exactly one level) and a
//! trailing `#` (all remaining levels). A configured root prefix is
//! prepended to every pattern and published topic unless it starts with
//! `//`, which escapes the root and addresses the bus absolutely.
//!
//! Dispatch runs on the bus client's delivery thread and must not block:
//! handlers are invoked synchronously, in registration order, and are
//! expected to hand heavy work to their own chain's thread.

use std::fmt;

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Errors raised while registering subscriptions
#[derive(Debug, Clone, PartialEq)]
pub enum BusError {
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::InvalidPattern { pattern, reason } => {
                write!(f, "invalid topic pattern '{}': {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for BusError {}

/// One message delivered by the bus client
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Subscription callback, with its kind fixed at registration time
///
/// `Payload` handlers only see the raw bytes; `Message` handlers also get
/// the concrete topic, which matters under wildcard subscriptions.
pub enum BusCallback {
    Payload(Box<dyn FnMut(&[u8])>),
    Message(Box<dyn FnMut(&BusMessage)>),
}

impl BusCallback {
    fn invoke(&mut self, message: &BusMessage) {
        match self {
            BusCallback::Payload(callback) => callback(&message.payload),
            BusCallback::Message(callback) => callback(message),
        }
    }
}

/// Opaque identifier returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u32);

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    /// `+`: exactly one level
    SingleLevel,
    /// `#`: all remaining levels, only valid as the last segment
    MultiLevel,
}

/// A parsed, root-resolved topic pattern
#[derive(Debug, Clone, PartialEq)]
pub struct TopicPattern {
    segments: Vec<Segment>,
}

impl TopicPattern {
    /// Parse `pattern`, prepending the `root` prefix unless the pattern
    /// starts with `//`
    pub fn parse(pattern: &str, root: &str) -> BusResult<Self> {
        let resolved = resolve_topic(pattern, root);
        let raw: Vec<&str> = resolved.split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (index, part) in raw.iter().enumerate() {
            let segment = match *part {
                "" => {
                    return Err(BusError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: "empty topic level".to_string(),
                    })
                }
                "+" => Segment::SingleLevel,
                "#" => {
                    if index + 1 != raw.len() {
                        return Err(BusError::InvalidPattern {
                            pattern: pattern.to_string(),
                            reason: "'#' must be the last level".to_string(),
                        });
                    }
                    Segment::MultiLevel
                }
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Whether a concrete topic matches this pattern
    pub fn matches(&self, topic: &str) -> bool {
        let levels: Vec<&str> = topic.split('/').collect();
        let mut position = 0;
        for segment in &self.segments {
            match segment {
                Segment::MultiLevel => return position <= levels.len(),
                Segment::SingleLevel => {
                    if position >= levels.len() {
                        return false;
                    }
                    position += 1;
                }
                Segment::Literal(expected) => {
                    if levels.get(position) != Some(&expected.as_str()) {
                        return false;
                    }
                    position += 1;
                }
            }
        }
        position == levels.len()
    }
}

/// Resolve a topic against the configured root prefix
///
/// `//`-prefixed topics address the bus absolutely; everything else lives
/// under the root. An empty root resolves topics unchanged.
pub fn resolve_topic(topic: &str, root: &str) -> String {
    if let Some(absolute) = topic.strip_prefix("//") {
        absolute.to_string()
    } else if root.is_empty() {
        topic.to_string()
    } else {
        format!("{}/{}", root, topic)
    }
}

struct Subscription {
    handle: CallbackHandle,
    pattern: TopicPattern,
    callback: BusCallback,
}

/// Routes inbound messages to subscribed handlers
///
/// Handlers matching a message run synchronously in registration order.
/// One message may match several subscriptions; each fires once.
pub struct TopicDispatcher {
    root: String,
    subscriptions: Vec<Subscription>,
    next_handle: u32,
}

impl TopicDispatcher {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            subscriptions: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Register a callback for topics matching `pattern`
    pub fn subscribe(&mut self, pattern: &str, callback: BusCallback) -> BusResult<CallbackHandle> {
        let pattern = TopicPattern::parse(pattern, &self.root)?;
        let handle = CallbackHandle(self.next_handle);
        self.next_handle += 1;
        self.subscriptions.push(Subscription {
            handle,
            pattern,
            callback,
        });
        Ok(handle)
    }

    /// Remove a subscription; returns whether the handle was known
    pub fn unsubscribe(&mut self, handle: CallbackHandle) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.handle != handle);
        self.subscriptions.len() != before
    }

    /// Deliver one message to every matching handler, in registration
    /// order; returns how many handlers fired
    pub fn dispatch(&mut self, message: &BusMessage) -> usize {
        let mut fired = 0;
        for subscription in &mut self.subscriptions {
            if subscription.pattern.matches(&message.topic) {
                subscription.callback.invoke(message);
                fired += 1;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn message(topic: &str, payload: &[u8]) -> BusMessage {
        BusMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_root_prefix_is_prepended() {
        let pattern = TopicPattern::parse("sensors/imu", "rover").unwrap();
        assert!(pattern.matches("rover/sensors/imu"));
        assert!(!pattern.matches("sensors/imu"));
    }

    #[test]
    fn test_double_slash_escapes_root() {
        let pattern = TopicPattern::parse("//global/clock", "rover").unwrap();
        assert!(pattern.matches("global/clock"));
        assert!(!pattern.matches("rover/global/clock"));
    }

    #[test]
    fn test_single_level_wildcard() {
        let pattern = TopicPattern::parse("sensors/+/raw", "").unwrap();
        assert!(pattern.matches("sensors/imu/raw"));
        assert!(pattern.matches("sensors/uwb/raw"));
        assert!(!pattern.matches("sensors/raw"));
        assert!(!pattern.matches("sensors/imu/calibrated/raw"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        let pattern = TopicPattern::parse("sensors/#", "").unwrap();
        assert!(pattern.matches("sensors/imu"));
        assert!(pattern.matches("sensors/imu/raw/x"));
        assert!(pattern.matches("sensors"));
        assert!(!pattern.matches("actuators/wheel"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(TopicPattern::parse("sensors/#/raw", "").is_err());
        assert!(TopicPattern::parse("sensors//raw", "").is_err());
    }

    #[test]
    fn test_resolve_topic_for_publishing() {
        assert_eq!(resolve_topic("pose", "rover"), "rover/pose");
        assert_eq!(resolve_topic("//global/pose", "rover"), "global/pose");
        assert_eq!(resolve_topic("pose", ""), "pose");
    }

    #[test]
    fn test_dispatch_registration_order_and_kinds() {
        let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = TopicDispatcher::new("rover");

        let payload_log = Rc::clone(&log);
        dispatcher
            .subscribe(
                "sensors/+",
                BusCallback::Payload(Box::new(move |payload| {
                    payload_log
                        .borrow_mut()
                        .push(format!("payload:{}", payload.len()));
                })),
            )
            .unwrap();

        let message_log = Rc::clone(&log);
        dispatcher
            .subscribe(
                "sensors/imu",
                BusCallback::Message(Box::new(move |msg| {
                    message_log.borrow_mut().push(format!("topic:{}", msg.topic));
                })),
            )
            .unwrap();

        let fired = dispatcher.dispatch(&message("rover/sensors/imu", b"abc"));
        assert_eq!(fired, 2);
        assert_eq!(
            *log.borrow(),
            vec!["payload:3".to_string(), "topic:rover/sensors/imu".to_string()]
        );
    }

    #[test]
    fn test_non_matching_topic_fires_nothing() {
        let mut dispatcher = TopicDispatcher::new("rover");
        dispatcher
            .subscribe("sensors/imu", BusCallback::Payload(Box::new(|_| {})))
            .unwrap();
        assert_eq!(dispatcher.dispatch(&message("rover/sensors/uwb", b"")), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0u32));
        let mut dispatcher = TopicDispatcher::new("");

        let counter = Rc::clone(&count);
        let handle = dispatcher
            .subscribe(
                "pose",
                BusCallback::Payload(Box::new(move |_| *counter.borrow_mut() += 1)),
            )
            .unwrap();

        dispatcher.dispatch(&message("pose", b""));
        assert!(dispatcher.unsubscribe(handle));
        dispatcher.dispatch(&message("pose", b""));

        assert_eq!(*count.borrow(), 1);
        // Unknown handles are reported, not ignored silently
        assert!(!dispatcher.unsubscribe(handle));
    }
}
