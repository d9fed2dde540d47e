//! Property tests for the fan-out aggregator.
//!
//! Invariants tested:
//! - Output order matches input order regardless of completion order
//! - Any failing branch fails the join with one of the failing indices
//! - Every branch runs to completion before a failure is returned

use super::paused_runtime;
use proptest::prelude::*;
use resilient_core::{boxed, BoxOperation, CallContext, CoreError};
use resilient_fanout::aggregate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn branch(
    index: usize,
    latency_ms: u64,
    fails: bool,
    finished: &Arc<AtomicUsize>,
) -> BoxOperation<usize, String> {
    let finished = Arc::clone(finished);
    boxed(move |_ctx: CallContext| {
        let finished = Arc::clone(&finished);
        async move {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            if fails {
                Err(format!("branch {}", index))
            } else {
                Ok(index)
            }
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: values come back in submission order
    #[test]
    fn join_preserves_order(latencies in prop::collection::vec(0u64..=200, 0..20)) {
        let rt = paused_runtime();
        rt.block_on(async {
            let finished = Arc::new(AtomicUsize::new(0));
            let ops: Vec<_> = latencies
                .iter()
                .enumerate()
                .map(|(i, ms)| branch(i, *ms, false, &finished))
                .collect();

            let result = aggregate(&CallContext::new(), ops).await;

            prop_assert_eq!(result, Ok((0..latencies.len()).collect::<Vec<_>>()));
            Ok(())
        })?;
    }

    /// Property: a failure names a failing branch and waits for the rest
    #[test]
    fn failure_names_a_failing_branch(
        branches in prop::collection::vec((0u64..=200, any::<bool>()), 1..20),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let finished = Arc::new(AtomicUsize::new(0));
            let ops: Vec<_> = branches
                .iter()
                .enumerate()
                .map(|(i, (ms, fails))| branch(i, *ms, *fails, &finished))
                .collect();

            let result = aggregate(&CallContext::new(), ops).await;
            prop_assert_eq!(finished.load(Ordering::SeqCst), branches.len());

            let any_failed = branches.iter().any(|(_, fails)| *fails);
            match result {
                Ok(values) => {
                    prop_assert!(!any_failed);
                    prop_assert_eq!(values.len(), branches.len());
                }
                Err(CoreError::UpstreamFailure { index, cause }) => {
                    prop_assert!(branches[index].1, "branch {} did not fail", index);
                    prop_assert_eq!(cause, format!("branch {}", index));
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            Ok(())
        })?;
    }
}
