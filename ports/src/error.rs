//! Shared error taxonomy for port implementations
//!
//! Each crate that implements a port wraps its own internal errors into
//! this enum at the boundary; callers match on it without reaching into
//! provider-specific detail.

use thiserror::Error;

/// Errors a port call can surface to its caller.
#[derive(Debug, Error)]
pub enum PortError {
    /// The remote side rejected the call outright (4xx-equivalent).
    #[error("rejected by provider: {0}")]
    Rejected(String),

    /// The call could plausibly succeed if retried (5xx/timeout-equivalent).
    #[error("transient failure: {0}")]
    Transient(String),

    /// The provider is known to be unavailable; do not retry immediately.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// A signature, hash, or mandate binding failed to verify.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// The request was well-formed but the requested object doesn't exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization or encoding error while preparing or parsing a call.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Any other error a provider implementation needs to surface.
    #[error("port error: {0}")]
    Other(String),
}

impl PortError {
    /// Whether a caller should consider retrying this call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PortError::Transient(_) | PortError::Unavailable(_))
    }
}
