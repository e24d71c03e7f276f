//! The sub-ledger (C4): per-agent available/pending/held balances
//! embedded in the single platform-wide treasury.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::SubLedger;
pub use types::{Balances, Bucket, Operation, ReconcileReport, SubLedgerAccount, TransactionRecord};
