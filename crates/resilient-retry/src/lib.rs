//! Retries guarded by a circuit breaker.
//!
//! [`Retrier::execute`] calls an operation up to `max_attempts` times. Every
//! attempt goes through a shared [`CircuitBreaker`]; failures sleep an
//! exponentially growing, jittered delay before the next attempt. The loop
//! stops early when:
//! - an attempt succeeds
//! - the breaker rejects an attempt ([`CoreError::CircuitOpen`])
//! - the caller's [`CallContext`] is cancelled or its deadline passes, even
//!   mid-attempt or mid-sleep
//!
//! Once every attempt has failed the last error is returned inside
//! [`CoreError::RetriesExhausted`].
//!
//! # Features
//!
//! - **IntervalFunction abstraction**: pluggable backoff strategies
//!   - Exponential with jitter (default)
//!   - Fixed interval
//!   - Custom function-based backoff
//! - **Event system**: observability through retry events
//!
//! # Examples
//!
//! ```
//! use resilient_circuitbreaker::CircuitBreaker;
//! use resilient_core::{CallContext, CoreError};
//! use resilient_retry::RetryConfig;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let breaker = CircuitBreaker::builder().name("users").build().unwrap();
//! let retrier = RetryConfig::builder()
//!     .name("users")
//!     .base_delay(Duration::from_millis(50))
//!     .max_delay(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//!
//! let ctx = CallContext::new().with_timeout(Duration::from_secs(5));
//! let op = |_ctx: CallContext| async { Err::<u32, _>("unreachable") };
//!
//! match retrier.execute(&ctx, &breaker, &op, 2).await {
//!     Err(CoreError::RetriesExhausted { attempts, last_error }) => {
//!         assert_eq!(attempts, 2);
//!         assert_eq!(last_error, "unreachable");
//!     }
//!     other => panic!("unexpected: {:?}", other),
//! }
//! # }
//! ```

mod backoff;
mod config;
mod events;

pub use backoff::{ExponentialJitterBackoff, FixedInterval, FnInterval, IntervalFunction};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use resilient_circuitbreaker::{CircuitBreaker, CircuitBreakerError};
use resilient_core::{CallContext, ContextError, CoreError, Operation};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Runs operations through a breaker with bounded, backed-off retries.
///
/// Cheap to clone; clones share configuration and listeners.
#[derive(Clone, Default)]
pub struct Retrier {
    config: Arc<RetryConfig>,
}

impl Retrier {
    pub(crate) fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns a new configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "retry_calls_total",
                    "Total number of retried calls by final outcome"
                );
                describe_counter!(
                    "retry_attempts_total",
                    "Total number of attempts made by the retrier"
                );
            });
        }
        RetryConfigBuilder::new()
    }

    /// The configuration this retrier was built with.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calls `op` through `breaker` up to `max_attempts` times.
    ///
    /// Each attempt receives a clone of `ctx`. If `ctx` ends while an attempt
    /// is running, the attempt future is dropped and `Cancelled` or `Timeout`
    /// is returned. `max_attempts == 0` is rejected with `InvalidInput`.
    pub async fn execute<O, T, E>(
        &self,
        ctx: &CallContext,
        breaker: &CircuitBreaker,
        op: &O,
        max_attempts: usize,
    ) -> Result<T, CoreError<E>>
    where
        O: Operation<T, E> + ?Sized,
    {
        if max_attempts == 0 {
            return Err(CoreError::invalid_input("max_attempts must be at least 1"));
        }

        let config = &self.config;
        let mut attempt = 1;

        loop {
            let outcome = tokio::select! {
                biased;
                reason = ctx.done() => {
                    return Err(self.interrupted(attempt, reason));
                }
                result = breaker.call(|| op.call(ctx.clone())) => result,
            };

            #[cfg(feature = "metrics")]
            counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

            let error = match outcome {
                Ok(value) => {
                    config.event_listeners.emit(&RetryEvent::Success {
                        name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "success").increment(1);

                    return Ok(value);
                }
                Err(CircuitBreakerError::OpenCircuit { name }) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(retry = %config.name, breaker = %name, attempt, "circuit open, giving up");

                    config.event_listeners.emit(&RetryEvent::CircuitOpen {
                        name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        breaker: name.clone(),
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "circuit_open").increment(1);

                    return Err(CoreError::CircuitOpen { name });
                }
                Err(CircuitBreakerError::Inner(error)) => error,
            };

            if attempt >= max_attempts {
                #[cfg(feature = "tracing")]
                tracing::debug!(retry = %config.name, attempts = attempt, "retries exhausted");

                config.event_listeners.emit(&RetryEvent::Exhausted {
                    name: config.name.clone(),
                    timestamp: Instant::now(),
                    attempts: attempt,
                });

                #[cfg(feature = "metrics")]
                counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "exhausted").increment(1);

                return Err(CoreError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }
            drop(error);

            let delay = config.interval_fn.next_interval(attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(retry = %config.name, attempt, ?delay, "attempt failed, scheduling retry");

            config.event_listeners.emit(&RetryEvent::Retry {
                name: config.name.clone(),
                timestamp: Instant::now(),
                attempt,
                delay,
            });

            if let Err(reason) = ctx.sleep(delay).await {
                return Err(self.interrupted(attempt, reason));
            }

            attempt += 1;
        }
    }

    /// Bundles a breaker, an operation and an attempt budget into a new
    /// operation, ready to be handed to the fan-out aggregator.
    ///
    /// ```rust
    /// use resilient_circuitbreaker::CircuitBreaker;
    /// use resilient_core::{CallContext, Operation};
    /// use resilient_retry::Retrier;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let breaker = CircuitBreaker::builder().build().unwrap();
    /// let guarded = Retrier::default().guard(
    ///     breaker,
    ///     |_ctx: CallContext| async { Ok::<_, String>("profile") },
    ///     3,
    /// );
    /// let profile = Operation::call(&guarded, CallContext::new()).await;
    /// assert_eq!(profile.unwrap(), "profile");
    /// # }
    /// ```
    pub fn guard<O, T, E>(
        &self,
        breaker: CircuitBreaker,
        op: O,
        max_attempts: usize,
    ) -> impl Fn(CallContext) -> BoxFuture<'static, Result<T, CoreError<E>>> + Send + Sync + 'static
    where
        O: Operation<T, E> + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let guarded = Arc::new(Guarded {
            retrier: self.clone(),
            breaker,
            op,
            max_attempts,
        });

        move |ctx: CallContext| {
            let guarded = Arc::clone(&guarded);
            let attempts: BoxFuture<'static, _> = Box::pin(async move {
                guarded
                    .retrier
                    .execute(&ctx, &guarded.breaker, &guarded.op, guarded.max_attempts)
                    .await
            });
            attempts
        }
    }

    fn interrupted<E>(&self, attempt: usize, reason: ContextError) -> CoreError<E> {
        #[cfg(feature = "tracing")]
        tracing::debug!(retry = %self.config.name, attempt, %reason, "retry loop interrupted");

        self.config.event_listeners.emit(&RetryEvent::Interrupted {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            attempt,
            reason,
        });

        #[cfg(feature = "metrics")]
        {
            let outcome = match reason {
                ContextError::Cancelled => "cancelled",
                ContextError::DeadlineExceeded => "timeout",
            };
            counter!("retry_calls_total", "retry" => self.config.name.clone(), "outcome" => outcome).increment(1);
        }

        reason.into()
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("name", &self.config.name)
            .finish()
    }
}

struct Guarded<O> {
    retrier: Retrier,
    breaker: CircuitBreaker,
    op: O,
    max_attempts: usize,
}

/// Calls `op` through `breaker` up to `max_attempts` times with the default
/// backoff (100ms base, 10s cap, jitter up to half the delay).
pub async fn execute<O, T, E>(
    ctx: &CallContext,
    breaker: &CircuitBreaker,
    op: &O,
    max_attempts: usize,
) -> Result<T, CoreError<E>>
where
    O: Operation<T, E> + ?Sized,
{
    Retrier::default()
        .execute(ctx, breaker, op, max_attempts)
        .await
}
