use resilient_core::ConfigError;
use std::time::Duration;

/// Computes how long to wait after a failed attempt.
pub trait IntervalFunction: Send + Sync {
    /// Delay to sleep after attempt number `attempt` (1-indexed) failed.
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Capped exponential backoff with additive jitter.
///
/// For attempt `n` the base delay is `min(max_delay, base_delay * 2^(n-1))`.
/// A uniformly random jitter in `[0, base / 2]` is added on top, so the
/// returned delay never exceeds `1.5 * max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialJitterBackoff {
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialJitterBackoff {
    /// Creates a backoff, rejecting a zero base or a cap below the base.
    pub fn new(base_delay: Duration, max_delay: Duration) -> Result<Self, ConfigError> {
        if base_delay.is_zero() {
            return Err(ConfigError::ZeroBaseDelay);
        }
        if max_delay < base_delay {
            return Err(ConfigError::MaxDelayBelowBase {
                base_delay,
                max_delay,
            });
        }
        Ok(Self {
            base_delay,
            max_delay,
        })
    }

    /// Initial delay.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Cap applied before jitter.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// The deterministic part of the delay for `attempt`, before jitter.
    pub fn capped_interval(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

impl Default for ExponentialJitterBackoff {
    /// 100ms base, 10s cap.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl IntervalFunction for ExponentialJitterBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        use rand::Rng;
        let capped = self.capped_interval(attempt);
        let spread = u64::try_from((capped / 2).as_nanos()).unwrap_or(u64::MAX);
        let jitter = rand::rng().random_range(0..=spread);
        capped.saturating_add(Duration::from_nanos(jitter))
    }
}

/// Fixed interval backoff - returns the same duration for every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a new fixed interval backoff.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Backoff computed by a closure of the failed attempt number.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Creates a new function-based interval.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
