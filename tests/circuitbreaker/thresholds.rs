use super::breaker;
use resilient_circuitbreaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn fail(
    breaker: &CircuitBreaker,
    calls: &Arc<AtomicUsize>,
) -> Result<(), CircuitBreakerError<&'static str>> {
    let calls = Arc::clone(calls);
    breaker
        .call(|| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        })
        .await
}

async fn succeed(
    breaker: &CircuitBreaker,
    calls: &Arc<AtomicUsize>,
) -> Result<(), CircuitBreakerError<&'static str>> {
    let calls = Arc::clone(calls);
    breaker
        .call(|| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
}

#[tokio::test]
async fn three_failures_open_the_circuit() {
    let breaker = breaker("threshold", 3, Duration::from_secs(30));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        assert_eq!(
            fail(&breaker, &calls).await,
            Err(CircuitBreakerError::Inner("boom"))
        );
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
    assert_eq!(
        fail(&breaker, &calls).await,
        Err(CircuitBreakerError::Inner("boom"))
    );
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let rejected = succeed(&breaker, &calls).await;
    assert_eq!(
        rejected,
        Err(CircuitBreakerError::OpenCircuit {
            name: "threshold".to_string()
        })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 3, "rejected call must not run");
}

#[tokio::test]
async fn success_clears_the_failure_streak() {
    let breaker = breaker("streak", 3, Duration::from_secs(30));
    let calls = Arc::new(AtomicUsize::new(0));

    let _ = fail(&breaker, &calls).await;
    let _ = fail(&breaker, &calls).await;
    assert_eq!(breaker.metrics().consecutive_failures, 2);

    succeed(&breaker, &calls).await.unwrap();
    assert_eq!(breaker.metrics().consecutive_failures, 0);

    let _ = fail(&breaker, &calls).await;
    let _ = fail(&breaker, &calls).await;
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().consecutive_failures, 2);
}

#[tokio::test]
async fn threshold_of_one_opens_on_first_failure() {
    let breaker = breaker("fragile", 1, Duration::from_secs(30));
    let calls = Arc::new(AtomicUsize::new(0));

    let _ = fail(&breaker, &calls).await;
    assert!(breaker.is_open());
    assert_eq!(breaker.http_status(), 503);
    assert_eq!(breaker.health_status(), "unhealthy");
}

#[tokio::test(start_paused = true)]
async fn open_circuit_rejects_until_timeout_elapses() {
    let breaker = breaker("cooldown", 1, Duration::from_secs(1));
    let calls = Arc::new(AtomicUsize::new(0));
    let _ = fail(&breaker, &calls).await;

    tokio::time::advance(Duration::from_millis(999)).await;
    assert!(succeed(&breaker, &calls).await.unwrap_err().is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    succeed(&breaker, &calls).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn hooks_see_failures_and_rejections() {
    let failures = Arc::new(AtomicUsize::new(0));
    let rejections = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&failures);
    let r = Arc::clone(&rejections);

    let breaker = CircuitBreaker::builder()
        .name("hooks")
        .failure_threshold(2)
        .on_failure(move |_, _| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .on_call_rejected(move || {
            r.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let _ = fail(&breaker, &calls).await;
    }

    assert_eq!(failures.load(Ordering::SeqCst), 2);
    assert_eq!(rejections.load(Ordering::SeqCst), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
