//! Consecutive-failure circuit breaker.
//!
//! A circuit breaker stops calling a dependency that keeps failing, then lets
//! a single probe through once it has had time to recover.
//!
//! ## States
//! - **Closed**: calls run; consecutive failures are counted and any success
//!   clears the count
//! - **Open**: reached after `failure_threshold` consecutive failures; calls
//!   are rejected until `open_timeout` has passed since the last failure
//! - **Half-Open**: exactly one trial call runs. Success closes the circuit,
//!   failure opens it again with a fresh timeout
//!
//! A breaker is a cheap handle. Clones share one circuit, so the same
//! instance can guard every retry attempt and every fan-out branch that talks
//! to a given dependency.
//!
//! ## Usage
//!
//! ```rust
//! use resilient_circuitbreaker::{CircuitBreaker, CircuitState};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker = CircuitBreaker::builder()
//!     .name("profile-db")
//!     .failure_threshold(2)
//!     .open_timeout(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//!
//! for _ in 0..2 {
//!     let _ = breaker.call(|| async { Err::<(), _>("connection refused") }).await;
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected = breaker.call(|| async { Ok::<_, &str>(()) }).await;
//! assert!(rejected.unwrap_err().is_circuit_open());
//! # }
//! ```
//!
//! Tower services can be wrapped with [`CircuitBreakerLayer`], built from a
//! breaker with [`CircuitBreaker::layer`].

use crate::circuit::{Admission, Circuit};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

mod circuit;
mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Shared handle to one circuit.
///
/// The circuit lives behind a blocking mutex that is only held for the
/// bookkeeping around a call, never across the call itself. A lock-free copy
/// of the state is kept for [`state_sync`](Self::state_sync).
#[derive(Clone)]
pub struct CircuitBreaker {
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Arc::new(Mutex::new(Circuit::new(Arc::clone(&state_atomic)))),
            state_atomic,
            config: Arc::new(config),
        }
    }

    /// Returns a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_calls_total",
                    "Total number of calls through the circuit breaker"
                );
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_gauge!(
                    "circuitbreaker_state",
                    "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
                );
            });
        }
        CircuitBreakerConfigBuilder::new()
    }

    /// The configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// The breaker's name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Runs `f` if the circuit admits it and records the outcome.
    ///
    /// Rejected calls never invoke `f` and return
    /// [`CircuitBreakerError::OpenCircuit`]. Any `Err` from the future counts
    /// as a failure. If the returned future is dropped while a half-open
    /// trial is running, the trial slot is released and nothing is recorded.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = {
            let mut circuit = self.lock();
            circuit.try_acquire(&self.config, Instant::now())
        };

        let trial = match admission {
            Admission::Permitted { trial } => {
                #[cfg(feature = "tracing")]
                tracing::trace!(breaker = %self.config.name, trial, "circuit breaker permitted call");
                trial
            }
            Admission::Rejected => {
                #[cfg(feature = "tracing")]
                tracing::trace!(breaker = %self.config.name, "circuit breaker rejected call");

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => self.config.name.clone(), "outcome" => "rejected").increment(1);

                return Err(CircuitBreakerError::OpenCircuit {
                    name: self.config.name.clone(),
                });
            }
        };

        let mut guard = TrialGuard {
            breaker: self,
            armed: trial,
        };
        let result = f().await;
        guard.armed = false;

        {
            let mut circuit = self.lock();
            match &result {
                Ok(_) => circuit.record_success(&self.config, trial),
                Err(_) => circuit.record_failure(&self.config, Instant::now(), trial),
            }
        }

        result.map_err(CircuitBreakerError::Inner)
    }

    /// Returns the current state.
    ///
    /// An open circuit whose timeout has elapsed still reports `Open` until
    /// the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.lock().state()
    }

    /// Returns the current state without taking the lock.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state_sync() == CircuitState::Open
    }

    /// Returns a snapshot of the circuit's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.lock().metrics(&self.config)
    }

    /// Forces the circuit open. It half-opens after `open_timeout` as usual.
    pub fn force_open(&self) {
        self.lock().force_open(&self.config);
    }

    /// Closes the circuit and clears its failure history.
    pub fn reset(&self) {
        self.lock().reset(&self.config);
    }

    /// Returns an HTTP status code based on circuit state.
    ///
    /// - Closed: 200 (OK)
    /// - HalfOpen: 200 (OK)
    /// - Open: 503 (Service Unavailable)
    pub fn http_status(&self) -> u16 {
        match self.state_sync() {
            CircuitState::Closed | CircuitState::HalfOpen => 200,
            CircuitState::Open => 503,
        }
    }

    /// Returns "healthy", "degraded" or "unhealthy" for closed, half-open and open.
    pub fn health_status(&self) -> &'static str {
        match self.state_sync() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }

    /// Returns a tower layer that guards services with this breaker.
    pub fn layer(&self) -> CircuitBreakerLayer {
        CircuitBreakerLayer::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        // Circuit updates cannot panic midway through, so a poisoned lock still
        // holds consistent state.
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &self.state_sync())
            .finish()
    }
}

/// Releases the half-open slot if a trial is dropped before it completes.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().release_trial(&self.breaker.config);
        }
    }
}
