//! Shared plumbing for the resilient request core.
//!
//! This crate holds what the fan-out aggregator and the guarded retrier have
//! in common:
//! - [`CallContext`]: one cancellation token and deadline threaded through
//!   every branch and attempt
//! - [`Operation`]: the unit of work the core invokes
//! - [`CoreError`]: the error taxonomy callers match on
//! - the event listener system used for observability

pub mod context;
pub mod error;
pub mod events;
pub mod operation;

pub use context::{CallContext, ContextError};
pub use error::{ConfigError, CoreError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use operation::{boxed, service_operation, BoxOperation, Operation};
