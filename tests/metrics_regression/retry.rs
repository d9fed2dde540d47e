//! Retry metrics regression tests

use super::helpers::*;
use resilient_circuitbreaker::CircuitBreaker;
use resilient_core::CallContext;
use resilient_retry::Retrier;
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let retrier = Retrier::builder()
        .name("test_retry")
        .fixed_backoff(Duration::from_millis(1))
        .build()
        .unwrap();
    let breaker = CircuitBreaker::builder()
        .name("retry_dep")
        .failure_threshold(10)
        .build()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let flaky = move |_ctx: CallContext| {
        let n = c.fetch_add(1, Ordering::SeqCst);
        std::future::ready(if n == 0 { Err("first") } else { Ok(n) })
    };
    let _ = retrier
        .execute(&CallContext::new(), &breaker, &flaky, 3)
        .await;

    let failing = |_ctx: CallContext| std::future::ready(Err::<(), _>("always"));
    let _ = retrier
        .execute(&CallContext::new(), &breaker, &failing, 2)
        .await;

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "test_retry");

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "test_retry");
    assert_metric_has_label("retry_calls_total", "outcome", "success");
    assert_metric_has_label("retry_calls_total", "outcome", "exhausted");
}

#[tokio::test]
#[serial]
async fn retry_interruption_metrics() {
    init_recorder();

    let retrier = Retrier::builder()
        .name("interrupted_retry")
        .fixed_backoff(Duration::from_secs(60))
        .build()
        .unwrap();
    let breaker = CircuitBreaker::builder()
        .name("interrupted_dep")
        .failure_threshold(1)
        .build()
        .unwrap();
    let failing = |_ctx: CallContext| std::future::ready(Err::<(), _>("down"));

    let ctx = CallContext::new().with_timeout(Duration::from_millis(20));
    let _ = retrier.execute(&ctx, &breaker, &failing, 3).await;
    assert_metric_has_label("retry_calls_total", "outcome", "timeout");

    // The single failure above opened the breaker.
    let _ = retrier
        .execute(&CallContext::new(), &breaker, &failing, 3)
        .await;
    assert_metric_has_label("retry_calls_total", "outcome", "circuit_open");

    let ctx = CallContext::new();
    ctx.cancel();
    let _ = retrier.execute(&ctx, &breaker, &failing, 3).await;
    assert_metric_has_label("retry_calls_total", "outcome", "cancelled");
}
