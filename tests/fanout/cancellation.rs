use super::after;
use futures::StreamExt;
use resilient_core::{CallContext, ContextError, CoreError};
use resilient_fanout::{aggregate, FanOut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn cancellation_returns_promptly() {
    let ops: Vec<_> = (0..4).map(|i| after(60_000, Ok(i))).collect();
    let ctx = CallContext::new();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let result = aggregate(&ctx, ops).await;

    assert_eq!(result, Err(CoreError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn deadline_returns_timeout() {
    let ops = vec![after(10, Ok(1)), after(60_000, Ok(2))];
    let ctx = CallContext::new().with_timeout(Duration::from_millis(500));

    let start = Instant::now();
    let result = aggregate(&ctx, ops).await;

    assert_eq!(result, Err(CoreError::Timeout));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn failure_seen_before_the_deadline_is_kept() {
    let ops = vec![after::<u8>(10, Err("broken".to_string())), after(60_000, Ok(2))];
    let ctx = CallContext::new().with_timeout(Duration::from_millis(500));

    let result = aggregate(&ctx, ops).await;

    assert_eq!(
        result,
        Err(CoreError::UpstreamFailure {
            index: 0,
            cause: "broken".to_string()
        })
    );
}

#[tokio::test]
async fn done_context_launches_nothing() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let i = Arc::clone(&invoked);
    let op = move |_ctx: CallContext| {
        i.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, String>(()) }
    };
    let ctx = CallContext::new();
    ctx.cancel();

    let result = aggregate(&ctx, vec![op.clone(), op]).await;

    assert_eq!(result, Err(CoreError::Cancelled));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn branches_that_watch_the_context_stop_with_it() {
    let op = |ctx: CallContext| async move {
        ctx.sleep(Duration::from_secs(60))
            .await
            .map_err(|reason| reason.to_string())
    };
    let ctx = CallContext::new();
    let mut stream = FanOut::default().aggregate_stream(&ctx, vec![op; 3]);

    tokio::time::sleep(Duration::from_millis(10)).await;
    ctx.cancel();

    let start = Instant::now();
    let mut reported = Vec::new();
    while let Some(branch) = stream.next().await {
        reported.push(branch);
    }

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(reported.len(), 3);
    assert_eq!(stream.remaining(), 0);
    for branch in reported {
        assert_eq!(
            branch.outcome,
            Err(CoreError::UpstreamFailure {
                index: branch.index,
                cause: "context cancelled".to_string()
            })
        );
    }
}

#[tokio::test(start_paused = true)]
async fn interruption_reports_pending_branches() {
    let seen = Arc::new(Mutex::new(None));
    let s = Arc::clone(&seen);
    let fanout = FanOut::builder()
        .name("interrupted")
        .on_interrupted(move |reason, pending| {
            *s.lock().unwrap() = Some((reason, pending));
        })
        .build()
        .unwrap();

    let ops = vec![after(10, Ok(1)), after(60_000, Ok(2)), after(60_000, Ok(3))];
    let ctx = CallContext::new().with_timeout(Duration::from_millis(100));

    let _ = fanout.aggregate(&ctx, ops).await;

    assert_eq!(
        *seen.lock().unwrap(),
        Some((ContextError::DeadlineExceeded, 2))
    );
}
