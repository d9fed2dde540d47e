use crate::CircuitState;
use resilient_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved between states.
    StateTransition {
        name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was admitted. `trial` is set for the single half-open probe.
    CallPermitted {
        name: String,
        timestamp: Instant,
        state: CircuitState,
        trial: bool,
    },
    /// A call was rejected without running.
    CallRejected {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// An admitted call succeeded.
    SuccessRecorded {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// An admitted call failed.
    FailureRecorded {
        name: String,
        timestamp: Instant,
        state: CircuitState,
        consecutive_failures: usize,
    },
    /// The half-open trial was dropped before it finished; another may run.
    TrialAbandoned { name: String, timestamp: Instant },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::TrialAbandoned { .. } => "trial_abandoned",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::TrialAbandoned { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { name, .. }
            | CircuitBreakerEvent::CallPermitted { name, .. }
            | CircuitBreakerEvent::CallRejected { name, .. }
            | CircuitBreakerEvent::SuccessRecorded { name, .. }
            | CircuitBreakerEvent::FailureRecorded { name, .. }
            | CircuitBreakerEvent::TrialAbandoned { name, .. } => name,
        }
    }
}
