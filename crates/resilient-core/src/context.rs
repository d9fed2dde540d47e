//! Cancellation and deadline propagation.
//!
//! A [`CallContext`] is created by the caller and cloned into every fan-out
//! branch and every retry attempt. Clones share one cancellation token and one
//! deadline, so cancelling any clone interrupts all work derived from it.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`CallContext`] stopped admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// [`CallContext::cancel`] was called on this context or a parent.
    #[error("context cancelled")]
    Cancelled,
    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline.
///
/// # Examples
///
/// ```
/// use resilient_core::CallContext;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = CallContext::new().with_timeout(Duration::from_secs(2));
/// assert!(ctx.err().is_none());
///
/// ctx.cancel();
/// assert!(ctx.is_cancelled());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never done until cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy whose deadline is `timeout` from now, or the existing
    /// deadline if that one is earlier.
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Returns a copy with `deadline`, keeping an earlier existing deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Derives a context that is cancelled together with `self` but can also
    /// be cancelled on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and every clone and child of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Non-blocking check. Cancellation wins over an expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => ContextError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }

    /// Sleeps for `duration` unless the context finishes first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
