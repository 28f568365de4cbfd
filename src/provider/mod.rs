//! Rate-limited sensor sampling
//!
//! Hardware drivers implement [`DataProvider`]; a [`RateLimitedProvider`]
//! wraps one and paces `get()` so the device is never polled faster than
//! its configured frequency. Pacing blocks the calling thread, so each
//! provider belongs to its own acquisition thread.

use crate::core::types::Data;
use log::debug;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised while sampling a sensor
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The requested polling frequency is zero, negative, or not finite
    InvalidFrequency { frequency_hz: f64 },
    /// The provider was asked for data after being closed
    Closed,
    /// The underlying device failed to produce a sample
    Device { reason: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::InvalidFrequency { frequency_hz } => {
                write!(f, "invalid polling frequency: {} Hz", frequency_hz)
            }
            ProviderError::Closed => write!(f, "provider is closed"),
            ProviderError::Device { reason } => write!(f, "device error: {}", reason),
        }
    }
}

impl std::error::Error for ProviderError {}

/// A source of sensor samples
///
/// Implementations talk to the actual hardware (or a replay log) and
/// return one raw reading per call. Timestamping and pacing are handled
/// by the wrapping [`RateLimitedProvider`].
pub trait DataProvider {
    type Item;

    /// Take one reading from the device
    fn sample(&mut self) -> ProviderResult<Self::Item>;

    /// Release the device; called once when the wrapper is closed
    fn close(&mut self) -> ProviderResult<()> {
        Ok(())
    }
}

/// Paces an underlying [`DataProvider`] to a maximum polling frequency
///
/// `get()` blocks until at least one period has elapsed since the
/// previous sample was taken, then samples and stamps the reading with
/// seconds elapsed since this wrapper was constructed. Timestamps come
/// from a monotonic clock, so they are strictly increasing and immune to
/// wall-clock adjustments.
pub struct RateLimitedProvider<P: DataProvider> {
    inner: P,
    interval: Duration,
    epoch: Instant,
    next_allowed: Instant,
    closed: bool,
}

impl<P: DataProvider> RateLimitedProvider<P> {
    /// Wrap `inner`, limiting it to `frequency_hz` samples per second
    pub fn new(inner: P, frequency_hz: f64) -> ProviderResult<Self> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(ProviderError::InvalidFrequency { frequency_hz });
        }
        let epoch = Instant::now();
        Ok(Self {
            inner,
            interval: Duration::from_secs_f64(1.0 / frequency_hz),
            epoch,
            next_allowed: epoch,
            closed: false,
        })
    }

    /// Minimum spacing between samples
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Take the next sample, sleeping first if the device was polled too
    /// recently
    pub fn get(&mut self) -> ProviderResult<Data<P::Item>> {
        if self.closed {
            return Err(ProviderError::Closed);
        }
        let now = Instant::now();
        if now < self.next_allowed {
            thread::sleep(self.next_allowed - now);
        }
        let value = self.inner.sample()?;
        let sampled_at = Instant::now();
        self.next_allowed = sampled_at + self.interval;
        Ok(Data::new(
            value,
            sampled_at.duration_since(self.epoch).as_secs_f64(),
        ))
    }

    /// Close the provider and release the device
    ///
    /// Subsequent `get()` calls fail with [`ProviderError::Closed`].
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> ProviderResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("closing provider");
        self.inner.close()
    }
}
