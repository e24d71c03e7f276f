//! The hybrid ledger (C7): dual-writes a fast queryable store (C5) with
//! an immutable hash-chained audit trail (C6), owning both directly so
//! neither of those crates needs a back-reference to the other.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod error;
pub mod ledger;

pub use config::{Config, WriteMode};
pub use error::{Error, Result};
pub use ledger::{AuditJob, HybridLedger};
