//! The fast, queryable ledger store (C5).
//!
//! Owns per-account append-only entries, balance snapshots, and the
//! locking that serializes writes to a given account. Deliberately
//! has no dependency on the audit trail: `hybrid-ledger` composes this
//! crate with `audit-trail` from above rather than this crate reaching
//! up to it, which would recreate the cyclic reference the original
//! design carried.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod lock_manager;
pub mod metrics;
pub mod storage;
pub mod types;

pub use config::{Config, RocksDbConfig};
pub use engine::LedgerEngine;
pub use error::{Error, Result};
pub use lock_manager::{LockManager, ResourceKey};
pub use metrics::Metrics;
pub use types::{BalanceSnapshot, EntryDraft, EntryStatus, EntryType, LedgerEntry};
