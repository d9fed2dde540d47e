use resilient_core::events::ResilienceEvent;
use resilient_core::ContextError;
use std::time::{Duration, Instant};

/// Events emitted by a [`Retrier`](crate::Retrier).
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and another is scheduled after `delay`.
    Retry {
        name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// An attempt succeeded.
    Success {
        name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Every allowed attempt failed.
    Exhausted {
        name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// The breaker rejected an attempt, ending the loop.
    CircuitOpen {
        name: String,
        timestamp: Instant,
        attempt: usize,
        breaker: String,
    },
    /// The caller's context ended the loop.
    Interrupted {
        name: String,
        timestamp: Instant,
        attempt: usize,
        reason: ContextError,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "Retry",
            RetryEvent::Success { .. } => "Success",
            RetryEvent::Exhausted { .. } => "Exhausted",
            RetryEvent::CircuitOpen { .. } => "CircuitOpen",
            RetryEvent::Interrupted { .. } => "Interrupted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::CircuitOpen { timestamp, .. }
            | RetryEvent::Interrupted { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            RetryEvent::Retry { name, .. }
            | RetryEvent::Success { name, .. }
            | RetryEvent::Exhausted { name, .. }
            | RetryEvent::CircuitOpen { name, .. }
            | RetryEvent::Interrupted { name, .. } => name,
        }
    }
}
