//! Error taxonomy for the fiat orchestrator

use thiserror::Error;

/// Errors the fiat orchestrator's flows can raise.
#[derive(Debug, Error)]
pub enum Error {
    #[error("insufficient available balance: have {available}, need {required}")]
    InsufficientAvailable { available: String, required: String },

    #[error("sub-ledger error: {0}")]
    SubLedger(#[from] sub_ledger::Error),

    #[error("treasury port error: {0}")]
    Treasury(String),

    #[error("compensation failed after step {step}: {reason}")]
    CompensationFailed { step: &'static str, reason: String },

    #[error("unknown ramp session: {0}")]
    UnknownSession(String),
}

impl Error {
    /// The machine-readable error code this maps to in the shared taxonomy.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InsufficientAvailable { .. } => "insufficient_balance",
            Error::SubLedger(e) => match e {
                sub_ledger::Error::InsufficientAvailable { .. } => "insufficient_balance",
                sub_ledger::Error::InsufficientHeld { .. } => "insufficient_held",
                sub_ledger::Error::AccountNotFound(_) => "not_found",
                sub_ledger::Error::AccountExists(_) => "already_exists",
                _ => "provider_unavailable",
            },
            Error::Treasury(_) => "provider_unavailable",
            Error::CompensationFailed { .. } => "invariant_violated",
            Error::UnknownSession(_) => "not_found",
        }
    }
}

/// Convenient result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
