//! The payment executor (C11): the top-level pipeline that drives
//! mandate verification, compliance preflight, settlement dispatch, and
//! durable recording — the composition root every other component in
//! this workspace is wired together underneath.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod error;
pub mod executor;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use executor::PaymentExecutor;
pub use types::{ExecutorResult, ExecutorStatus, PaymentState};
