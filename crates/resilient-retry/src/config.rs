use crate::backoff::{ExponentialJitterBackoff, FixedInterval, IntervalFunction};
use crate::events::RetryEvent;
use crate::Retrier;
use resilient_core::events::{EventListeners, FnListener};
use resilient_core::{ConfigError, ContextError};
use std::sync::Arc;
use std::time::Duration;

/// Configuration shared by every call made through a [`Retrier`].
pub struct RetryConfig {
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl RetryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Name used in events, logs and metrics labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delay the retrier would sleep after `attempt` failed.
    pub fn next_interval(&self, attempt: usize) -> Duration {
        self.interval_fn.next_interval(attempt)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_fn: Arc::new(ExponentialJitterBackoff::default()),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }
}

enum Backoff {
    Exponential { base: Duration, max: Duration },
    Custom(Arc<dyn IntervalFunction>),
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder {
    backoff: Backoff,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - backoff: exponential with jitter, 100ms base, 10s cap
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        let default = ExponentialJitterBackoff::default();
        Self {
            backoff: Backoff::Exponential {
                base: default.base_delay(),
                max: default.max_delay(),
            },
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the exponential backoff's initial delay.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        let max = match self.backoff {
            Backoff::Exponential { max, .. } => max,
            Backoff::Custom(_) => ExponentialJitterBackoff::default().max_delay(),
        };
        self.backoff = Backoff::Exponential { base: delay, max };
        self
    }

    /// Sets the cap applied to the exponential delay before jitter.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        let base = match self.backoff {
            Backoff::Exponential { base, .. } => base,
            Backoff::Custom(_) => ExponentialJitterBackoff::default().base_delay(),
        };
        self.backoff = Backoff::Exponential { base, max: delay };
        self
    }

    /// Sleeps the same duration between every attempt.
    pub fn fixed_backoff(mut self, duration: Duration) -> Self {
        self.backoff = Backoff::Custom(Arc::new(FixedInterval::new(duration)));
        self
    }

    /// Sets a custom interval function for backoff.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.backoff = Backoff::Custom(Arc::new(interval_fn));
        self
    }

    /// Sets the name for this retrier (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a retry is scheduled.
    ///
    /// Called with the attempt that just failed (1-indexed) and the delay
    /// before the next one.
    ///
    /// # Example
    ///
    /// ```rust
    /// use resilient_retry::RetryConfig;
    /// use std::time::Duration;
    ///
    /// let retrier = RetryConfig::builder()
    ///     .base_delay(Duration::from_millis(50))
    ///     .on_retry(|attempt, delay| {
    ///         println!("attempt {} failed, retrying in {:?}", attempt, delay);
    ///     })
    ///     .build()
    ///     .unwrap();
    /// # let _ = retrier;
    /// ```
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Retry { attempt, delay, .. } = event {
                    f(*attempt, *delay);
                }
            }));
        self
    }

    /// Registers a callback when an attempt succeeds, with the number of
    /// attempts it took.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Success { attempts, .. } = event {
                    f(*attempts);
                }
            }));
        self
    }

    /// Registers a callback when every attempt has failed.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Exhausted { attempts, .. } = event {
                    f(*attempts);
                }
            }));
        self
    }

    /// Registers a callback when the breaker rejects an attempt. Called with
    /// the attempt number and the breaker's name.
    pub fn on_circuit_open<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::CircuitOpen {
                    attempt, breaker, ..
                } = event
                {
                    f(*attempt, breaker);
                }
            }));
        self
    }

    /// Registers a callback when the caller's context stops the loop.
    pub fn on_interrupted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, ContextError) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Interrupted {
                    attempt, reason, ..
                } = event
                {
                    f(*attempt, *reason);
                }
            }));
        self
    }

    /// Validates the configuration and returns a retrier.
    pub fn build(self) -> Result<Retrier, ConfigError> {
        let interval_fn: Arc<dyn IntervalFunction> = match self.backoff {
            Backoff::Exponential { base, max } => Arc::new(ExponentialJitterBackoff::new(base, max)?),
            Backoff::Custom(interval_fn) => interval_fn,
        };

        let config = RetryConfig {
            interval_fn,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        Ok(Retrier::new(config))
    }
}
