//! Guarded retrier behaviour.
//!
//! Test organization:
//! - behavior.rs: attempt counting, exhaustion and breaker interaction
//! - backoff.rs: delays observed between attempts
//! - cancellation.rs: context cancellation and deadlines
//! - events.rs: listener callbacks


use resilient_circuitbreaker::CircuitBreaker;
use resilient_core::CallContext;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn breaker(threshold: usize) -> CircuitBreaker {
    CircuitBreaker::builder()
        .name("dependency")
        .failure_threshold(threshold)
        .open_timeout(Duration::from_secs(60))
        .build()
        .unwrap()
}

/// An operation that fails its first `fail_first` calls, then returns the
/// call number.
pub(crate) fn flaky(
    fail_first: usize,
) -> (
    Arc<AtomicUsize>,
    impl Fn(CallContext) -> std::future::Ready<Result<usize, String>> + Send + Sync + 'static,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let op = move |_ctx: CallContext| {
        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
        std::future::ready(if n <= fail_first {
            Err(format!("failure {}", n))
        } else {
            Ok(n)
        })
    };
    (calls, op)
}
