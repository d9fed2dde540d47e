use super::after;
use resilient_core::{BoxOperation, CallContext};
use resilient_fanout::{aggregate, FanOut};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn results_follow_submission_order() {
    let ops = vec![
        after(300, Ok("user")),
        after(100, Ok("posts")),
        after(200, Ok("friends")),
    ];

    let result = aggregate(&CallContext::new(), ops).await;
    assert_eq!(result, Ok(vec!["user", "posts", "friends"]));
}

#[tokio::test(start_paused = true)]
async fn many_branches_keep_their_positions() {
    let ops: Vec<_> = (0..10u64).map(|i| after(100 - i * 10, Ok(i))).collect();

    let result = aggregate(&CallContext::new(), ops).await.unwrap();
    assert_eq!(result, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn empty_input_yields_empty_output() {
    let ops: Vec<BoxOperation<u8, String>> = Vec::new();
    assert_eq!(aggregate(&CallContext::new(), ops).await, Ok(Vec::new()));
}

#[tokio::test]
async fn empty_input_succeeds_even_with_a_done_context() {
    let ctx = CallContext::new();
    ctx.cancel();
    let ops: Vec<BoxOperation<u8, String>> = Vec::new();
    assert_eq!(aggregate(&ctx, ops).await, Ok(Vec::new()));
}

#[tokio::test(start_paused = true)]
async fn branches_run_concurrently() {
    let ops: Vec<_> = (0..5).map(|i| after(100, Ok(i))).collect();

    let start = Instant::now();
    let result = aggregate(&CallContext::new(), ops).await;

    assert_eq!(result, Ok(vec![0, 1, 2, 3, 4]));
    assert!(start.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn every_branch_sees_the_callers_deadline() {
    let ctx = CallContext::new().with_timeout(Duration::from_secs(30));
    let deadline = ctx.deadline();
    let ops: Vec<_> = (0..3)
        .map(|_| |branch_ctx: CallContext| async move { Ok::<_, String>(branch_ctx.deadline()) })
        .collect();

    let seen = FanOut::default().aggregate(&ctx, ops).await.unwrap();
    assert!(seen.iter().all(|d| *d == deadline));
}
