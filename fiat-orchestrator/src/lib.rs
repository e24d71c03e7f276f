//! The fiat orchestrator (C10): multi-step deposit/withdraw/card-funding
//! flows over the sub-ledger and the treasury port, with explicit
//! compensation on partial failure.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod error;
pub mod flow;
pub mod orchestrator;
pub mod types;

pub use error::{Error, Result};
pub use orchestrator::FiatOrchestrator;
pub use types::{FlowOutcome, FlowStatus};
