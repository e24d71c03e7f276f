//! Error taxonomy for the payment executor's composition-root wiring

use thiserror::Error;

/// Errors that can arise composing or driving the pipeline, distinct
/// from the per-request outcomes `execute()` returns as an
/// [`crate::ExecutorResult`] (never as an `Err`).
#[derive(Debug, Error)]
pub enum Error {
    #[error("compliance engine error: {0}")]
    Compliance(#[from] compliance_engine::Error),

    #[error("hybrid ledger error: {0}")]
    Ledger(#[from] hybrid_ledger::Error),

    #[error("audit trail error: {0}")]
    Audit(#[from] audit_trail::Error),

    #[error("compensation failed: {0}")]
    CompensationFailed(String),
}

impl Error {
    /// The machine-readable error code this maps to in the shared taxonomy.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Compliance(_) => "provider_unavailable",
            Error::Ledger(_) => "provider_unavailable",
            Error::Audit(_) => "provider_unavailable",
            Error::CompensationFailed(_) => "invariant_violated",
        }
    }
}

/// Convenient result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
