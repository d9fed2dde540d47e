//! Property tests for exponential backoff with jitter.
//!
//! Invariants tested:
//! - The capped interval never decreases and never exceeds the cap
//! - Jittered delays stay within `[capped, 1.5 * capped]`

use proptest::prelude::*;
use resilient_retry::{ExponentialJitterBackoff, IntervalFunction};
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: capped intervals are monotone and bounded by the cap
    #[test]
    fn capped_interval_is_monotone(
        base_ms in 1u64..=1_000,
        cap_factor in 1u64..=1_000,
        attempts in 1usize..=80,
    ) {
        let base = Duration::from_millis(base_ms);
        let max = base * cap_factor as u32;
        let backoff = ExponentialJitterBackoff::new(base, max).unwrap();

        let mut previous = Duration::ZERO;
        for attempt in 1..=attempts {
            let capped = backoff.capped_interval(attempt);
            prop_assert!(capped >= previous, "attempt {} shrank to {:?}", attempt, capped);
            prop_assert!(capped <= max);
            prop_assert!(capped >= base);
            previous = capped;
        }
    }

    /// Property: jitter only ever adds up to half the capped interval
    #[test]
    fn jitter_stays_in_bounds(
        base_ms in 1u64..=500,
        cap_ms in 500u64..=20_000,
        attempt in 1usize..=40,
    ) {
        let backoff = ExponentialJitterBackoff::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(cap_ms),
        )
        .unwrap();

        let capped = backoff.capped_interval(attempt);
        for _ in 0..16 {
            let delay = backoff.next_interval(attempt);
            prop_assert!(delay >= capped);
            prop_assert!(delay <= capped + capped / 2);
        }
    }

    /// Property: a cap below the base is always rejected
    #[test]
    fn cap_below_base_is_rejected(base_ms in 2u64..=10_000, shortfall in 1u64..=1_000) {
        let base = Duration::from_millis(base_ms);
        let max = Duration::from_millis(base_ms.saturating_sub(shortfall));
        prop_assert!(ExponentialJitterBackoff::new(base, max).is_err());
    }
}
