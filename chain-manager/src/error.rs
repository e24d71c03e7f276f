//! Error taxonomy for the chain manager

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("chain dispatch failed: {0}")]
    Dispatch(#[from] retry_caller::CallerError<ports::error::PortError>),

    #[error("batch {batch_id} failed after {attempts} attempts: {reason}")]
    BatchFailed { batch_id: uuid::Uuid, attempts: u32, reason: String },

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
