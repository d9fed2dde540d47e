use crate::{CircuitBreaker, CircuitBreakerError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower layer that routes every request through a shared [`CircuitBreaker`].
///
/// All services produced by one layer, and every clone of them, report to the
/// same circuit.
///
/// ```rust
/// use resilient_circuitbreaker::CircuitBreaker;
/// use tower::{service_fn, ServiceBuilder};
///
/// let breaker = CircuitBreaker::builder().name("search").build().unwrap();
///
/// let service = ServiceBuilder::new()
///     .layer(breaker.layer())
///     .service(service_fn(|q: String| async move { Ok::<_, std::io::Error>(q) }));
/// # let _ = service;
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    /// Creates a layer backed by `breaker`.
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreakerService {
            inner: service,
            breaker: self.breaker.clone(),
        }
    }
}

/// Service produced by [`CircuitBreakerLayer`].
#[derive(Clone, Debug)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> CircuitBreakerService<S> {
    /// The breaker guarding this service.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // Take the service that was driven to readiness and leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let breaker = self.breaker.clone();

        Box::pin(async move { breaker.call(move || inner.call(req)).await })
    }
}
