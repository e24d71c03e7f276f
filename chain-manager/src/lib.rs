//! The chain manager (C9): dispatches verified settlements to a chain
//! under one of three modes (`internal_only`, `per_tx`, `batched`),
//! wrapping every outbound call through the retryable caller.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::Config;
pub use engine::ChainManager;
pub use error::{Error, Result};
pub use types::{SettlementMode, SettlementOutcome, SettlementRequest, SettlementStatus};
