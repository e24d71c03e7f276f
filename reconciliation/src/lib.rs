//! The reconciliation engine (C8): compares confirmed, chain-tagged
//! ledger entries against the chain's own record, classifies
//! disagreements, and resolves them.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::Config;
pub use engine::Reconciler;
pub use error::{Error, Result};
pub use types::{Discrepancy, DiscrepancyKind, ReconciliationReport, Resolution, ResolutionStrategy};
