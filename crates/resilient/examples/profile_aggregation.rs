//! Builds a profile page from three simulated backends.
//!
//! Each backend call is retried through its own circuit breaker and the three
//! calls are fanned out under one deadline. The recommendations backend is
//! down, so its breaker trips over repeated page loads and later loads fail
//! fast instead of waiting on it.
//!
//! Run with: RUST_LOG=debug cargo run -p resilient --example profile_aggregation

use resilient::prelude::*;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct BackendError(&'static str);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} unavailable", self.0)
    }
}

impl std::error::Error for BackendError {}

#[derive(Clone)]
struct Backend {
    name: &'static str,
    latency: Duration,
    down: bool,
    calls: Arc<AtomicUsize>,
}

impl Backend {
    fn new(name: &'static str, latency_ms: u64, down: bool) -> Self {
        Self {
            name,
            latency: Duration::from_millis(latency_ms),
            down,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn fetch(&self, ctx: CallContext) -> impl Future<Output = Result<String, BackendError>> + Send {
        let backend = self.clone();
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            ctx.sleep(backend.latency)
                .await
                .map_err(|_| BackendError(backend.name))?;
            if backend.down {
                Err(BackendError(backend.name))
            } else {
                Ok(format!("{} #{}", backend.name, n))
            }
        }
    }
}

struct Dependency {
    backend: Backend,
    breaker: CircuitBreaker,
    max_attempts: usize,
}

impl Dependency {
    fn new(backend: Backend, max_attempts: usize) -> Result<Self, ConfigError> {
        let name = backend.name;
        let breaker = CircuitBreaker::builder()
            .name(name)
            .failure_threshold(3)
            .open_timeout(Duration::from_secs(2))
            .on_state_transition(move |from, to| {
                println!("  [{}] breaker {:?} -> {:?}", name, from, to)
            })
            .build()?;
        Ok(Self {
            backend,
            breaker,
            max_attempts,
        })
    }

    fn guarded(&self, retrier: &Retrier) -> BoxOperation<String, CoreError<BackendError>> {
        let backend = self.backend.clone();
        boxed(retrier.guard(
            self.breaker.clone(),
            move |ctx: CallContext| backend.fetch(ctx),
            self.max_attempts,
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let dependencies = [
        Dependency::new(Backend::new("users", 30, false), 3)?,
        Dependency::new(Backend::new("posts", 50, false), 3)?,
        Dependency::new(Backend::new("recommendations", 10, true), 2)?,
    ];

    let retrier = Retrier::builder()
        .name("profile")
        .base_delay(Duration::from_millis(20))
        .max_delay(Duration::from_millis(200))
        .on_retry(|attempt, delay| println!("  retrying after attempt {} in {:?}", attempt, delay))
        .build()?;

    let fanout = FanOut::builder()
        .name("profile-page")
        .on_branch_completed(|index, ok, elapsed| {
            println!("  branch {} finished ok={} in {:?}", index, ok, elapsed)
        })
        .build()?;

    for load in 1..=4 {
        println!("page load {}", load);
        let ctx = CallContext::new().with_timeout(Duration::from_millis(500));
        let ops: Vec<_> = dependencies.iter().map(|d| d.guarded(&retrier)).collect();

        match fanout.aggregate(&ctx, ops).await {
            Ok(sections) => println!("  rendered: {:?}", sections),
            Err(CoreError::UpstreamFailure { index, cause }) => {
                println!("  section {} failed: {}", index, cause)
            }
            Err(other) => println!("  page failed: {}", other),
        }

        for dependency in &dependencies {
            println!(
                "  {}: {:?}, {} consecutive failures",
                dependency.breaker.name(),
                dependency.breaker.state(),
                dependency.breaker.metrics().consecutive_failures
            );
        }
    }

    println!("cancelled page load");
    let ctx = CallContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        canceller.cancel();
    });
    let ops: Vec<_> = dependencies.iter().map(|d| d.guarded(&retrier)).collect();
    let result = fanout.aggregate(&ctx, ops).await;
    println!("  result: {:?}", result.map_err(|e| e.to_string()));

    Ok(())
}
