//! Events emitted by the fan-out aggregator.

use resilient_core::{ContextError, ResilienceEvent};
use std::time::{Duration, Instant};

/// Events emitted while a fan-out runs.
#[derive(Debug, Clone)]
pub enum FanOutEvent {
    /// Every branch was handed to the runtime.
    Started {
        /// Name of the fan-out instance.
        name: String,
        /// Number of branches launched.
        branches: usize,
        /// When this event occurred.
        timestamp: Instant,
    },

    /// One branch finished.
    BranchCompleted {
        /// Name of the fan-out instance.
        name: String,
        /// Position of the branch in the submitted list.
        index: usize,
        /// Whether the branch produced a value.
        succeeded: bool,
        /// Time from launch to completion, including any wait for a slot.
        elapsed: Duration,
        /// When this event occurred.
        timestamp: Instant,
    },

    /// The join collected every branch.
    Completed {
        /// Name of the fan-out instance.
        name: String,
        /// Number of branches joined.
        branches: usize,
        /// How many of them failed.
        failures: usize,
        /// Time from launch to the last branch reporting.
        duration: Duration,
        /// When this event occurred.
        timestamp: Instant,
    },

    /// The caller's context ended the join early.
    Interrupted {
        /// Name of the fan-out instance.
        name: String,
        /// Why the context ended.
        reason: ContextError,
        /// Branches that had not reported yet.
        pending: usize,
        /// When this event occurred.
        timestamp: Instant,
    },
}

impl ResilienceEvent for FanOutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FanOutEvent::Started { .. } => "started",
            FanOutEvent::BranchCompleted { .. } => "branch_completed",
            FanOutEvent::Completed { .. } => "completed",
            FanOutEvent::Interrupted { .. } => "interrupted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            FanOutEvent::Started { timestamp, .. } => *timestamp,
            FanOutEvent::BranchCompleted { timestamp, .. } => *timestamp,
            FanOutEvent::Completed { timestamp, .. } => *timestamp,
            FanOutEvent::Interrupted { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            FanOutEvent::Started { name, .. } => name,
            FanOutEvent::BranchCompleted { name, .. } => name,
            FanOutEvent::Completed { name, .. } => name,
            FanOutEvent::Interrupted { name, .. } => name,
        }
    }
}
