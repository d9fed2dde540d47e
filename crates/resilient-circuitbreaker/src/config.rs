use crate::events::CircuitBreakerEvent;
use crate::{CircuitBreaker, CircuitState};
use resilient_core::{ConfigError, EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a consecutive-failure circuit breaker.
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: usize,
    pub(crate) open_timeout: Duration,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Consecutive failures that open the circuit.
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// How long the circuit stays open after the most recent failure.
    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    /// Name used in events, logs and metrics labels.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("failure_threshold", &self.failure_threshold)
            .field("open_timeout", &self.open_timeout)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: usize,
    open_timeout: Duration,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets how many consecutive failures open the circuit.
    ///
    /// Default: 3
    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Sets how long the circuit stays open, measured from the most recent
    /// failure, before a single trial call is allowed through.
    ///
    /// Default: 30 seconds
    pub fn open_timeout(mut self, duration: Duration) -> Self {
        self.open_timeout = duration;
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Registers a callback invoked with `(from, to)` on every state change.
    ///
    /// Breaker callbacks run while the circuit is locked and must not call
    /// back into the breaker.
    ///
    /// # Example
    /// ```rust
    /// use resilient_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let breaker = CircuitBreakerConfig::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("breaker tripped after {:?}", from);
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(breaker.state(), CircuitState::Closed);
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when a call is admitted. The flag is true for
    /// the half-open trial.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, bool) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { state, trial, .. } = event {
                    f(*state, *trial);
                }
            }));
        self
    }

    /// Registers a callback when a call is rejected without running.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback when a successful call is recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a failed call is recorded, with the state at
    /// the time and the new consecutive failure count.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded {
                    state,
                    consecutive_failures,
                    ..
                } = event
                {
                    f(*state, *consecutive_failures);
                }
            }));
        self
    }

    /// Validates the configuration and returns a breaker in the Closed state.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.open_timeout.is_zero() {
            return Err(ConfigError::ZeroOpenTimeout);
        }

        let config = CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            open_timeout: self.open_timeout,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        Ok(CircuitBreaker::new(config))
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
