//! Error taxonomy for the compliance engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("audit trail error: {0}")]
    Audit(#[from] audit_trail::Error),

    #[error("no compliance providers configured")]
    NoProvidersConfigured,
}

pub type Result<T> = std::result::Result<T, Error>;
