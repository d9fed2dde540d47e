//! Concurrent fan-out with ordered join.
//!
//! [`FanOut::aggregate`] runs a list of independent operations at the same
//! time and collects their values in submission order, no matter which
//! finished first. Every branch receives a clone of the caller's
//! [`CallContext`], so cancelling it or letting its deadline pass reaches all
//! of them at once.
//!
//! ## Outcomes
//!
//! - every branch succeeds: `Ok(values)` in the original order
//! - any branch fails: the aggregator still waits for the rest, then returns
//!   the first failure it observed as [`CoreError::UpstreamFailure`] carrying
//!   that branch's index
//! - the context ends first: the join returns promptly with
//!   [`CoreError::Cancelled`] or [`CoreError::Timeout`]; branches still
//!   running are left to notice the context themselves
//! - a branch panics: reported as [`CoreError::Panicked`]
//!
//! Nothing is retried here. Wrap individual operations with a guarded
//! retrier before handing them over if they need it.
//!
//! ## Example
//!
//! ```rust
//! use resilient_core::{boxed, BoxOperation, CallContext};
//! use resilient_fanout::aggregate;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let ops: Vec<BoxOperation<&str, String>> = vec![
//!     boxed(|_ctx| async {
//!         tokio::time::sleep(Duration::from_millis(30)).await;
//!         Ok("user")
//!     }),
//!     boxed(|_ctx| async { Ok("posts") }),
//! ];
//!
//! let ctx = CallContext::new().with_timeout(Duration::from_secs(1));
//! assert_eq!(aggregate(&ctx, ops).await.unwrap(), vec!["user", "posts"]);
//! # }
//! ```

mod config;
mod events;

pub use config::{FanOutConfig, FanOutConfigBuilder};
pub use events::FanOutEvent;

use futures::{FutureExt, Stream};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
use resilient_core::{CallContext, CoreError, Operation};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// What one branch reported.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchResult<T, E> {
    /// Position of the branch in the submitted list.
    pub index: usize,
    /// The branch's value, or why it has none.
    pub outcome: Result<T, CoreError<E>>,
}

/// Runs operations concurrently and joins their results.
#[derive(Clone, Default)]
pub struct FanOut {
    config: Arc<FanOutConfig>,
}

impl FanOut {
    pub(crate) fn from_config(config: FanOutConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns a new configuration builder.
    pub fn builder() -> FanOutConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "fanout_branches_total",
                    "Total number of fan-out branches by outcome"
                );
                describe_histogram!(
                    "fanout_duration_seconds",
                    "Time from launching a fan-out to joining every branch"
                );
            });
        }
        FanOutConfigBuilder::new()
    }

    /// The configuration this instance was built with.
    pub fn config(&self) -> &FanOutConfig {
        &self.config
    }

    /// Runs every operation concurrently and returns their values in order.
    ///
    /// An empty list succeeds immediately with an empty vector. A context
    /// that is already done fails without invoking any operation.
    pub async fn aggregate<O, T, E>(
        &self,
        ctx: &CallContext,
        ops: Vec<O>,
    ) -> Result<Vec<T>, CoreError<E>>
    where
        O: Operation<T, E> + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let branches = ops.len();
        let start = Instant::now();
        let mut rx = self.launch(ctx, ops);

        let mut slots: Vec<Option<T>> = (0..branches).map(|_| None).collect();
        let mut first_error: Option<CoreError<E>> = None;
        let mut received = 0;
        let mut failures = 0;

        while received < branches {
            let next = tokio::select! {
                biased;
                branch = rx.recv() => branch,
                reason = ctx.done() => {
                    let pending = branches - received;

                    #[cfg(feature = "tracing")]
                    tracing::debug!(fanout = %self.config.name, %reason, pending, "fan-out interrupted");

                    self.config.listeners.emit(&FanOutEvent::Interrupted {
                        name: self.config.name.clone(),
                        reason,
                        pending,
                        timestamp: Instant::now(),
                    });

                    return Err(first_error.unwrap_or_else(|| reason.into()));
                }
            };

            // Every task sends exactly once, so the channel only closes early
            // if the runtime dropped a task while shutting down.
            let Some(branch) = next else { break };
            received += 1;

            match branch.outcome {
                Ok(value) => slots[branch.index] = Some(value),
                Err(error) => {
                    failures += 1;
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        let duration = start.elapsed();

        #[cfg(feature = "tracing")]
        tracing::debug!(fanout = %self.config.name, branches, failures, ?duration, "fan-out joined");

        #[cfg(feature = "metrics")]
        histogram!("fanout_duration_seconds", "fanout" => self.config.name.clone())
            .record(duration.as_secs_f64());

        self.config.listeners.emit(&FanOutEvent::Completed {
            name: self.config.name.clone(),
            branches,
            failures,
            duration,
            timestamp: Instant::now(),
        });

        if let Some(error) = first_error {
            return Err(error);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or(CoreError::Cancelled)
    }

    /// Runs every operation concurrently and yields each [`BranchResult`] as
    /// it completes.
    ///
    /// The stream ends after every branch has reported. It does not stop on
    /// failure: cancel `ctx` to ask the remaining branches to give up, or drop
    /// the stream to stop listening.
    pub fn aggregate_stream<O, T, E>(&self, ctx: &CallContext, ops: Vec<O>) -> BranchStream<T, E>
    where
        O: Operation<T, E> + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let remaining = ops.len();
        let rx = self.launch(ctx, ops);
        BranchStream { rx, remaining }
    }

    fn launch<O, T, E>(&self, ctx: &CallContext, ops: Vec<O>) -> mpsc::Receiver<BranchResult<T, E>>
    where
        O: Operation<T, E> + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let branches = ops.len();
        let (tx, rx) = mpsc::channel(branches.max(1));
        let slots = self
            .config
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n)));
        let start = Instant::now();

        for (index, op) in ops.into_iter().enumerate() {
            let tx = tx.clone();
            let ctx = ctx.clone();
            let config = Arc::clone(&self.config);
            let slots = slots.clone();

            tokio::spawn(async move {
                let outcome = run_branch(index, &ctx, &op, slots).await;
                let elapsed = start.elapsed();
                let succeeded = outcome.is_ok();

                #[cfg(feature = "metrics")]
                {
                    let label = match &outcome {
                        Ok(_) => "success",
                        Err(CoreError::Panicked { .. }) => "panicked",
                        Err(CoreError::Cancelled) | Err(CoreError::Timeout) => "interrupted",
                        Err(_) => "failure",
                    };
                    counter!("fanout_branches_total", "fanout" => config.name.clone(), "outcome" => label).increment(1);
                }

                config.listeners.emit(&FanOutEvent::BranchCompleted {
                    name: config.name.clone(),
                    index,
                    succeeded,
                    elapsed,
                    timestamp: Instant::now(),
                });

                // The receiver may be gone if the caller stopped waiting.
                let _ = tx.send(BranchResult { index, outcome }).await;
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(fanout = %self.config.name, branches, "fan-out launched");

        self.config.listeners.emit(&FanOutEvent::Started {
            name: self.config.name.clone(),
            branches,
            timestamp: Instant::now(),
        });

        rx
    }
}

impl std::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOut")
            .field("name", &self.config.name)
            .field("max_concurrency", &self.config.max_concurrency)
            .finish()
    }
}

async fn run_branch<O, T, E>(
    index: usize,
    ctx: &CallContext,
    op: &O,
    slots: Option<Arc<Semaphore>>,
) -> Result<T, CoreError<E>>
where
    O: Operation<T, E>,
{
    let _permit = match slots {
        Some(slots) => tokio::select! {
            biased;
            reason = ctx.done() => return Err(reason.into()),
            permit = slots.acquire_owned() => permit.ok(),
        },
        None => None,
    };

    if let Some(reason) = ctx.err() {
        return Err(reason.into());
    }

    match AssertUnwindSafe(async { op.call(ctx.clone()).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(cause)) => Err(CoreError::UpstreamFailure { index, cause }),
        Err(_) => Err(CoreError::Panicked { index }),
    }
}

/// Branch results in completion order, returned by
/// [`FanOut::aggregate_stream`].
#[derive(Debug)]
pub struct BranchStream<T, E> {
    rx: mpsc::Receiver<BranchResult<T, E>>,
    remaining: usize,
}

impl<T, E> BranchStream<T, E> {
    /// Branches that have not reported yet.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<T, E> Stream for BranchStream<T, E> {
    type Item = BranchResult<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = this.rx.poll_recv(cx);
        if let Poll::Ready(Some(_)) = &polled {
            this.remaining = this.remaining.saturating_sub(1);
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Runs every operation concurrently with an unnamed, unbounded [`FanOut`].
pub async fn aggregate<O, T, E>(ctx: &CallContext, ops: Vec<O>) -> Result<Vec<T>, CoreError<E>>
where
    O: Operation<T, E> + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    FanOut::default().aggregate(ctx, ops).await
}
