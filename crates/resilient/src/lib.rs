//! Resilient request core.
//!
//! Two cooperating building blocks for services that aggregate data from
//! several unreliable dependencies:
//!
//! - **Fan-out aggregator** ([`fanout`]): runs independent operations
//!   concurrently under one cancellable, deadline-bounded [`CallContext`]
//!   and joins their values in submission order
//! - **Guarded retrier** ([`retry`] + [`circuitbreaker`]): retries a single
//!   operation with capped exponential backoff and jitter, while a shared
//!   consecutive-failure circuit breaker stops calls to a dependency that
//!   keeps failing
//!
//! They compose: wrap each dependency call with [`Retrier::guard`] and hand
//! the guarded operations to [`FanOut::aggregate`].
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! resilient = { version = "0.1", features = ["metrics"] }
//! ```
//!
//! Structured logging through `tracing` is on by default; disable default
//! features to drop it.
//!
//! # Example
//!
//! ```rust
//! use resilient::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let users_db = CircuitBreaker::builder().name("users-db").build()?;
//! let retrier = Retrier::builder()
//!     .base_delay(Duration::from_millis(20))
//!     .build()?;
//!
//! let ops = vec![
//!     boxed(retrier.guard(users_db.clone(), |_ctx: CallContext| async { Ok::<_, std::io::Error>("alice") }, 3)),
//!     boxed(retrier.guard(users_db.clone(), |_ctx: CallContext| async { Ok::<_, std::io::Error>("bob") }, 3)),
//! ];
//!
//! let ctx = CallContext::new().with_timeout(Duration::from_secs(2));
//! let names = FanOut::default().aggregate(&ctx, ops).await?;
//! assert_eq!(names, vec!["alice", "bob"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Individual Crates
//!
//! Each piece is also available on its own:
//!
//! - `resilient-core` (context, operations, errors, events)
//! - `resilient-circuitbreaker`
//! - `resilient-retry`
//! - `resilient-fanout`

pub use resilient_circuitbreaker as circuitbreaker;
pub use resilient_core as core;
pub use resilient_fanout as fanout;
pub use resilient_retry as retry;

pub use resilient_circuitbreaker::{CircuitBreaker, CircuitState};
pub use resilient_core::{CallContext, ConfigError, CoreError, Operation};
pub use resilient_fanout::{aggregate, FanOut};
pub use resilient_retry::{execute, Retrier};

/// The types most callers need, in one import.
pub mod prelude {
    pub use resilient_circuitbreaker::{
        CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
    };
    pub use resilient_core::{
        boxed, BoxOperation, CallContext, ConfigError, ContextError, CoreError, Operation,
    };
    pub use resilient_fanout::{BranchResult, FanOut, FanOutConfig};
    pub use resilient_retry::{RetryConfig, Retrier};
}
