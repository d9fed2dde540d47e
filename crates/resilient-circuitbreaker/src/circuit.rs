use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls run normally.
    Closed = 0,
    /// Calls are rejected without running.
    Open = 1,
    /// One trial call is allowed through to probe recovery.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Point-in-time view of a breaker, taken under its lock.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: usize,
    /// Configured threshold that opens the circuit.
    pub failure_threshold: usize,
    /// Time since the most recent recorded failure, if any.
    pub time_since_last_failure: Option<Duration>,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
    /// Whether the half-open trial call is currently running.
    pub trial_in_flight: bool,
}

/// Outcome of asking the circuit for permission to run a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Permitted { trial: bool },
    Rejected,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    consecutive_failures: usize,
    last_failure: Option<Instant>,
    last_state_change: Instant,
    trial_in_flight: bool,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            consecutive_failures: 0,
            last_failure: None,
            last_state_change: Instant::now(),
            trial_in_flight: false,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn metrics(&self, config: &CircuitBreakerConfig) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            failure_threshold: config.failure_threshold,
            time_since_last_failure: self.last_failure.map(|at| at.elapsed()),
            time_since_state_change: self.last_state_change.elapsed(),
            trial_in_flight: self.trial_in_flight,
        }
    }

    pub fn try_acquire(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Admission {
        let admission = match self.state {
            CircuitState::Closed => Admission::Permitted { trial: false },
            CircuitState::Open => {
                // Forced opens have no failure on record; time them from the transition.
                let since = self.last_failure.unwrap_or(self.last_state_change);
                if now.saturating_duration_since(since) >= config.open_timeout {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.trial_in_flight = true;
                    Admission::Permitted { trial: true }
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    Admission::Rejected
                } else {
                    self.trial_in_flight = true;
                    Admission::Permitted { trial: true }
                }
            }
        };

        match admission {
            Admission::Permitted { trial } => {
                config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallPermitted {
                        name: config.name.clone(),
                        timestamp: std::time::Instant::now(),
                        state: self.state,
                        trial,
                    });
            }
            Admission::Rejected => {
                config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallRejected {
                        name: config.name.clone(),
                        timestamp: std::time::Instant::now(),
                        state: self.state,
                    });
            }
        }

        admission
    }

    pub fn record_success(&mut self, config: &CircuitBreakerConfig, trial: bool) {
        self.consecutive_failures = 0;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);

        if trial && self.state == CircuitState::HalfOpen {
            self.trial_in_flight = false;
            self.transition_to(CircuitState::Closed, config);
        }
    }

    pub fn record_failure(&mut self, config: &CircuitBreakerConfig, now: Instant, trial: bool) {
        self.consecutive_failures += 1;
        self.last_failure = Some(now);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                state: self.state,
                consecutive_failures: self.consecutive_failures,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);

        match self.state {
            CircuitState::Closed => {
                if self.consecutive_failures >= config.failure_threshold {
                    self.transition_to(CircuitState::Open, config);
                }
            }
            CircuitState::HalfOpen if trial => {
                self.trial_in_flight = false;
                self.transition_to(CircuitState::Open, config);
            }
            // Late results from calls admitted before the circuit tripped only
            // refresh last_failure.
            _ => {}
        }
    }

    /// Frees the half-open slot when the trial future was dropped unfinished.
    pub fn release_trial(&mut self, config: &CircuitBreakerConfig) {
        if self.state == CircuitState::HalfOpen && self.trial_in_flight {
            self.trial_in_flight = false;
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::TrialAbandoned {
                    name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                });
        }
    }

    pub fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.trial_in_flight = false;
        self.transition_to(CircuitState::Open, config);
    }

    pub fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.consecutive_failures = 0;
        self.last_failure = None;
        self.trial_in_flight = false;
        self.transition_to(CircuitState::Closed, config);
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = from_state.as_str(),
            to = state.as_str(),
            consecutive_failures = self.consecutive_failures,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        if state == CircuitState::Closed {
            self.consecutive_failures = 0;
        }
    }
}
