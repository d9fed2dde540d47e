use futures::future::BoxFuture;
use resilient_core::{CallContext, CoreError};
use resilient_fanout::FanOut;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    invoked: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        self.invoked.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

fn tracked(
    gauge: &Arc<Gauge>,
    latency: Duration,
) -> impl Fn(CallContext) -> BoxFuture<'static, Result<(), String>>
       + Clone
       + Send
       + Sync
       + 'static {
    let gauge = Arc::clone(gauge);
    move |_ctx: CallContext| -> BoxFuture<'static, Result<(), String>> {
        let gauge = Arc::clone(&gauge);
        Box::pin(async move {
            gauge.enter();
            tokio::time::sleep(latency).await;
            gauge.exit();
            Ok(())
        })
    }
}

#[tokio::test(start_paused = true)]
async fn limit_caps_branches_in_flight() {
    let gauge = Arc::new(Gauge::default());
    let op = tracked(&gauge, Duration::from_millis(100));
    let fanout = FanOut::builder().max_concurrency(2).build().unwrap();

    let start = Instant::now();
    let result = fanout.aggregate(&CallContext::new(), vec![op; 6]).await;

    assert_eq!(result.map(|values| values.len()), Ok(6));
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(start.elapsed() < Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn unbounded_runs_everything_at_once() {
    let gauge = Arc::new(Gauge::default());
    let op = tracked(&gauge, Duration::from_millis(100));

    let result = FanOut::default()
        .aggregate(&CallContext::new(), vec![op; 6])
        .await;

    assert!(result.is_ok());
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn queued_branches_give_up_with_the_context() {
    let gauge = Arc::new(Gauge::default());
    let op = tracked(&gauge, Duration::from_secs(10));
    let fanout = FanOut::builder().max_concurrency(1).build().unwrap();
    let ctx = CallContext::new().with_timeout(Duration::from_secs(1));

    let result = fanout.aggregate(&ctx, vec![op; 3]).await;
    assert_eq!(result, Err(CoreError::Timeout));

    // Let the running branch finish and any queued branch wake up.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(gauge.invoked.load(Ordering::SeqCst), 1);
}
