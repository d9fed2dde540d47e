//! Trips a breaker against a flaky dependency and reports health as it recovers.
//!
//! Run with: cargo run -p resilient-circuitbreaker --example circuitbreaker_health_check --features tracing

use resilient_circuitbreaker::{CircuitBreaker, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .init();

    let breaker = CircuitBreaker::builder()
        .name("inventory")
        .failure_threshold(3)
        .open_timeout(Duration::from_millis(200))
        .on_state_transition(|from, to| {
            println!("  [transition] {:?} -> {:?}", from, to);
        })
        .build()
        .expect("valid breaker config");

    // The dependency fails its first five calls, then recovers.
    let calls = Arc::new(AtomicUsize::new(0));

    for round in 1..=10 {
        let c = Arc::clone(&calls);
        let result = breaker
            .call(|| async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 5 {
                    Err(format!("call {} refused", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        println!(
            "round {:>2}: {:<45} status={} health={}",
            round,
            format!("{:?}", result),
            breaker.http_status(),
            breaker.health_status()
        );

        if breaker.state() == CircuitState::Open {
            tokio::time::sleep(Duration::from_millis(120)).await;
        }
    }

    let snapshot = breaker.metrics();
    println!(
        "final: {:?}, {} consecutive failures",
        snapshot.state, snapshot.consecutive_failures
    );
}
