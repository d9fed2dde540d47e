//! Error taxonomy shared by the aggregator and the guarded retrier.
//!
//! [`CoreError`] classifies every way a call through the core can end without
//! a value. The operation's own error type `E` is carried untouched inside
//! [`CoreError::UpstreamFailure`] and [`CoreError::RetriesExhausted`], so
//! callers keep full access to it:
//!
//! ```rust
//! use resilient_core::CoreError;
//!
//! fn classify(err: &CoreError<std::io::Error>) -> &'static str {
//!     match err {
//!         CoreError::CircuitOpen { .. } => "dependency unhealthy, fail fast",
//!         CoreError::Timeout | CoreError::Cancelled => "caller gave up",
//!         CoreError::RetriesExhausted { .. } => "transient failures persisted",
//!         CoreError::UpstreamFailure { .. } => "one branch failed",
//!         CoreError::InvalidInput { .. } => "bug in the caller",
//!         CoreError::Panicked { .. } => "bug in an operation",
//!     }
//! }
//! ```

use crate::context::ContextError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a fan-out or guarded call.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError<E> {
    /// An operation returned its own error.
    UpstreamFailure {
        /// Position of the failing branch (0 for single guarded calls).
        index: usize,
        /// The operation's error.
        cause: E,
    },

    /// The context deadline passed while waiting on branches, an attempt or a
    /// backoff sleep.
    Timeout,

    /// The context was cancelled explicitly.
    Cancelled,

    /// The circuit breaker rejected the call without running the operation.
    CircuitOpen {
        /// Name of the breaker that rejected the call.
        name: String,
    },

    /// Every attempt failed.
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Error of the final attempt.
        last_error: E,
    },

    /// The call itself was malformed (for example `max_attempts == 0`).
    InvalidInput {
        /// What was wrong.
        reason: String,
    },

    /// A fan-out branch panicked instead of returning.
    Panicked {
        /// Position of the branch that panicked.
        index: usize,
    },
}

impl<E> fmt::Display for CoreError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::UpstreamFailure { index, cause } => {
                write!(f, "upstream failure in branch {}: {}", index, cause)
            }
            CoreError::Timeout => write!(f, "deadline exceeded"),
            CoreError::Cancelled => write!(f, "call cancelled"),
            CoreError::CircuitOpen { name } => write!(f, "circuit breaker '{}' is open", name),
            CoreError::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "retries exhausted after {} attempts: {}", attempts, last_error),
            CoreError::InvalidInput { reason } => write!(f, "invalid input: {}", reason),
            CoreError::Panicked { index } => write!(f, "branch {} panicked", index),
        }
    }
}

impl<E> std::error::Error for CoreError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::UpstreamFailure { cause, .. } => Some(cause),
            CoreError::RetriesExhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}

impl<E> From<ContextError> for CoreError<E> {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => CoreError::Cancelled,
            ContextError::DeadlineExceeded => CoreError::Timeout,
        }
    }
}

impl<E> CoreError<E> {
    /// Shorthand for [`CoreError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`CoreError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::Timeout)
    }

    /// Returns `true` for [`CoreError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }

    /// Returns `true` for [`CoreError::CircuitOpen`].
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CoreError::CircuitOpen { .. })
    }

    /// Returns `true` for [`CoreError::RetriesExhausted`].
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, CoreError::RetriesExhausted { .. })
    }

    /// Returns `true` for [`CoreError::UpstreamFailure`].
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, CoreError::UpstreamFailure { .. })
    }

    /// Whether a higher layer may reasonably try the whole call again later.
    ///
    /// Open circuits, cancellations, malformed input and panics are
    /// permanent from the caller's point of view.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Timeout
                | CoreError::UpstreamFailure { .. }
                | CoreError::RetriesExhausted { .. }
        )
    }

    /// Borrows the operation's own error, if this failure carries one.
    pub fn upstream_error(&self) -> Option<&E> {
        match self {
            CoreError::UpstreamFailure { cause, .. } => Some(cause),
            CoreError::RetriesExhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }

    /// Consumes the error, returning the operation's own error if present.
    pub fn into_upstream_error(self) -> Option<E> {
        match self {
            CoreError::UpstreamFailure { cause, .. } => Some(cause),
            CoreError::RetriesExhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }

    /// Maps the operation error type, leaving classification intact.
    pub fn map_upstream<F, T>(self, f: F) -> CoreError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            CoreError::UpstreamFailure { index, cause } => CoreError::UpstreamFailure {
                index,
                cause: f(cause),
            },
            CoreError::Timeout => CoreError::Timeout,
            CoreError::Cancelled => CoreError::Cancelled,
            CoreError::CircuitOpen { name } => CoreError::CircuitOpen { name },
            CoreError::RetriesExhausted {
                attempts,
                last_error,
            } => CoreError::RetriesExhausted {
                attempts,
                last_error: f(last_error),
            },
            CoreError::InvalidInput { reason } => CoreError::InvalidInput { reason },
            CoreError::Panicked { index } => CoreError::Panicked { index },
        }
    }
}

/// Rejected configuration, returned by the component builders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `failure_threshold` must be at least 1.
    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    /// `open_timeout` must be positive.
    #[error("open_timeout must be greater than zero")]
    ZeroOpenTimeout,

    /// `base_delay` must be positive.
    #[error("base_delay must be greater than zero")]
    ZeroBaseDelay,

    /// `max_delay` must not be shorter than `base_delay`.
    #[error("max_delay ({max_delay:?}) must be at least base_delay ({base_delay:?})")]
    MaxDelayBelowBase {
        /// Configured base delay.
        base_delay: Duration,
        /// Configured maximum delay.
        max_delay: Duration,
    },

    /// `max_concurrency` must be at least 1 when set.
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
}
