//! Error taxonomy for the ledger engine

use thiserror::Error;

/// Errors the ledger engine's write and read paths can raise.
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("invalid amount: must be positive")]
    InvalidAmount,

    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: String, required: String },

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("lock timeout acquiring {resource}")]
    LockTimeout { resource: String },

    #[error("batch processing failed: {0}")]
    BatchProcessingFailed(String),

    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The machine-readable error code this maps to in the shared taxonomy.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) => "provider_unavailable",
            Error::InvalidAmount => "invalid_amount",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::EntryNotFound(_) => "not_found",
            Error::AccountNotFound(_) => "not_found",
            Error::LockTimeout { .. } => "lock_timeout",
            Error::BatchProcessingFailed(_) => "batch_processing_failed",
            Error::InvariantViolated(_) => "invariant_violated",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Convenient result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
