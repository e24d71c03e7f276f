//! Error taxonomy for the audit trail

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("chain is broken at position {chain_position} (entry {entry_id})")]
    ChainBroken { entry_id: String, chain_position: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
