//! Error taxonomy for the retryable-caller wrapper

use thiserror::Error;

/// Errors the wrapper itself can produce, distinct from the wrapped
/// operation's own error type `E`.
#[derive(Debug, Error)]
pub enum CallerError<E> {
    /// The circuit is open for this provider; the call was never attempted.
    #[error("circuit open for provider {provider}: retry after {retry_after_secs}s")]
    CircuitOpen {
        /// Name of the provider whose circuit is open.
        provider: String,
        /// Seconds remaining before the breaker half-opens.
        retry_after_secs: u64,
    },

    /// All retry attempts were exhausted.
    #[error("retries exhausted for provider {provider} after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Name of the provider that was called.
        provider: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last: E,
    },

    /// The wrapped operation failed with a non-retryable error.
    #[error("call failed: {0}")]
    Inner(E),
}

impl<E> CallerError<E> {
    /// The underlying inner error, if one was captured.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallerError::RetriesExhausted { last, .. } => Some(last),
            CallerError::Inner(e) => Some(e),
            CallerError::CircuitOpen { .. } => None,
        }
    }
}
