//! Error taxonomy for the reconciliation engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ledger error: {0}")]
    Ledger(#[from] ledger_engine::Error),

    #[error("chain provider error: {0}")]
    Chain(#[from] ports::error::PortError),

    #[error("audit store error: {0}")]
    Audit(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
