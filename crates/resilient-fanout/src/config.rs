//! Configuration for the fan-out aggregator.

use crate::events::FanOutEvent;
use crate::FanOut;
use resilient_core::{ConfigError, ContextError, EventListener, EventListeners, FnListener};
use std::time::Duration;

/// Configuration shared by every fan-out run through one [`FanOut`].
pub struct FanOutConfig {
    /// Name for metrics/tracing.
    pub(crate) name: String,
    /// Upper bound on branches running at once, if any.
    pub(crate) max_concurrency: Option<usize>,
    /// Event listeners.
    pub(crate) listeners: EventListeners<FanOutEvent>,
}

impl FanOutConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> FanOutConfigBuilder {
        FanOutConfigBuilder::new()
    }

    /// Name used in events, logs and metrics labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upper bound on branches running at once. `None` means unbounded.
    pub fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            max_concurrency: None,
            listeners: EventListeners::default(),
        }
    }
}

/// Builder for [`FanOutConfig`].
///
/// # Example
///
/// ```rust
/// use resilient_fanout::FanOutConfig;
///
/// let fanout = FanOutConfig::builder()
///     .name("profile-page")
///     .max_concurrency(8)
///     .build()
///     .unwrap();
/// assert_eq!(fanout.config().max_concurrency(), Some(8));
/// ```
pub struct FanOutConfigBuilder {
    config: FanOutConfig,
}

impl Default for FanOutConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FanOutConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: FanOutConfig::default(),
        }
    }

    /// Set the name for this fan-out instance (used in metrics/tracing).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Limit how many branches run at once.
    ///
    /// Branches past the limit wait for a free slot before their operation
    /// is invoked. The wait ends early if the caller's context is done.
    /// Unbounded by default.
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = Some(n);
        self
    }

    /// Add an event listener for fan-out events.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<FanOutEvent> + 'static,
    {
        self.config.listeners.add(listener);
        self
    }

    /// Called with the branch index, whether it succeeded, and how long it took.
    pub fn on_branch_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, bool, Duration) + Send + Sync + 'static,
    {
        self.config
            .listeners
            .add(FnListener::new(move |event: &FanOutEvent| {
                if let FanOutEvent::BranchCompleted {
                    index,
                    succeeded,
                    elapsed,
                    ..
                } = event
                {
                    f(*index, *succeeded, *elapsed);
                }
            }));
        self
    }

    /// Called with the branch count and failure count once the join finishes.
    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.config
            .listeners
            .add(FnListener::new(move |event: &FanOutEvent| {
                if let FanOutEvent::Completed {
                    branches, failures, ..
                } = event
                {
                    f(*branches, *failures);
                }
            }));
        self
    }

    /// Called when the caller's context ends the join, with the number of
    /// branches still outstanding.
    pub fn on_interrupted<F>(mut self, f: F) -> Self
    where
        F: Fn(ContextError, usize) + Send + Sync + 'static,
    {
        self.config
            .listeners
            .add(FnListener::new(move |event: &FanOutEvent| {
                if let FanOutEvent::Interrupted {
                    reason, pending, ..
                } = event
                {
                    f(*reason, *pending);
                }
            }));
        self
    }

    /// Validate the configuration and build a [`FanOut`].
    pub fn build(self) -> Result<FanOut, ConfigError> {
        if self.config.max_concurrency == Some(0) {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(FanOut::from_config(self.config))
    }
}
