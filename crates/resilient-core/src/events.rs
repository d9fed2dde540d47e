//! Observability hooks shared by the aggregator, breaker and retrier.
//!
//! Every component owns an [`EventListeners`] collection built through its
//! config builder. Components emit a typed event at each decision point
//! (call admitted, branch finished, backoff scheduled, ...) and listeners
//! receive it synchronously on the emitting task.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by one named component instance.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short, stable identifier of the event kind (e.g. `"state_transition"`).
    fn event_type(&self) -> &'static str;

    /// When the event was produced.
    fn timestamp(&self) -> Instant;

    /// Name of the breaker, retrier or aggregator that emitted the event.
    fn source_name(&self) -> &str;
}

/// Receives events of one type.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &E);
}

/// Ordered set of listeners for one event type.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. Listeners are invoked in registration order.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener and returns how many of them panicked.
    ///
    /// A panicking listener is isolated: the panic is swallowed and the
    /// remaining listeners still run.
    pub fn emit(&self, event: &E) -> usize {
        let mut panicked = 0;
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            if outcome.is_err() {
                panicked += 1;
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    source = event.source_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
        panicked
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners").finish_non_exhaustive()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
