use thiserror::Error;

/// Errors returned by a guarded call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker refused to run the call.
    #[error("circuit breaker `{name}` is open; call not permitted")]
    OpenCircuit {
        /// Name of the breaker that rejected the call.
        name: String,
    },

    /// The call ran and failed.
    #[error("inner operation error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the call was rejected without running.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Returns the inner error if the call ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::OpenCircuit { .. } => None,
        }
    }
}
