//! Error taxonomy for the hybrid ledger

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ledger engine error: {0}")]
    Ledger(#[from] ledger_engine::Error),

    #[error("audit trail error: {0}")]
    Audit(#[from] audit_trail::Error),

    #[error("dual write failed: ledger entry {entry_id} recorded but audit append failed ({audit_error}); ledger entry reversed")]
    DualWriteFailed { entry_id: String, audit_error: String },

    #[error("dual write failed and the compensating ledger reversal also failed: {0}")]
    CompensationFailed(String),

    #[error("async audit queue is full")]
    AuditQueueFull,

    #[error("cross-store reconciliation sample mismatch: {0}")]
    SampleMismatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
