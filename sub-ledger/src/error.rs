//! Error taxonomy for the sub-ledger

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("insufficient available balance: have {available}, need {required}")]
    InsufficientAvailable { available: String, required: String },

    #[error("insufficient held balance: have {held}, need {required}")]
    InsufficientHeld { held: String, required: String },

    #[error("ledger engine error: {0}")]
    Ledger(#[from] ledger_engine::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("treasury port error: {0}")]
    Treasury(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
