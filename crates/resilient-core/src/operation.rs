//! The unit of work the core runs.

use crate::context::CallContext;
use futures::future::BoxFuture;
use std::future::Future;
use tower::{Service, ServiceExt};

/// A capability that, given a [`CallContext`], produces a `T` or fails with `E`.
///
/// The core places no constraint on what an operation does internally. It is
/// invoked once per fan-out branch and up to `max_attempts` times by the
/// retrier, each time with a clone of the caller's context. Operations
/// should watch that context to stop early when the caller gives up.
///
/// Any `Fn(CallContext) -> impl Future<Output = Result<T, E>>` closure is an
/// operation:
///
/// ```rust
/// use resilient_core::{CallContext, Operation};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let op = |_ctx: CallContext| async { Ok::<_, std::io::Error>(42) };
///
/// assert_eq!(Operation::call(&op, CallContext::new()).await.unwrap(), 42);
/// # }
/// ```
pub trait Operation<T, E>: Send + Sync {
    /// Starts one invocation. The returned future owns everything it needs.
    fn call(&self, ctx: CallContext) -> BoxFuture<'static, Result<T, E>>;
}

impl<F, Fut, T, E> Operation<T, E> for F
where
    F: Fn(CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn call(&self, ctx: CallContext) -> BoxFuture<'static, Result<T, E>> {
        Box::pin(self(ctx))
    }
}

/// Type-erased operation, for mixing different closures in one fan-out.
pub type BoxOperation<T, E> =
    Box<dyn Fn(CallContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Erases the concrete type of `op`.
///
/// ```rust
/// use resilient_core::{boxed, BoxOperation, CallContext};
///
/// let ops: Vec<BoxOperation<u32, String>> = vec![
///     boxed(|_ctx: CallContext| async { Ok(1) }),
///     boxed(|_ctx: CallContext| async { Err("down".to_string()) }),
/// ];
/// assert_eq!(ops.len(), 2);
/// ```
pub fn boxed<F, Fut, T, E>(op: F) -> BoxOperation<T, E>
where
    F: Fn(CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(op(ctx)))
}

/// Adapts a tower [`Service`] that accepts a [`CallContext`] as its request.
///
/// Each invocation drives a fresh clone of `service` to readiness and calls
/// it once, so a single adapter can be shared by every retry attempt.
pub fn service_operation<S, T, E>(service: S) -> impl Operation<T, E>
where
    S: Service<CallContext, Response = T, Error = E> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    T: 'static,
    E: 'static,
{
    move |ctx: CallContext| service.clone().oneshot(ctx)
}
