//! The immutable, hash-chained audit trail (C6).
//!
//! Every record is linked to the one before it by
//! `entry_hash = SHA256(record_hash || prev_hash)`, and indexed in an
//! incremental Merkle tree so any record can carry a real inclusion
//! proof against the trail's current root, not just its chain link.
//! Owned directly by `hybrid-ledger` alongside `ledger-engine` — this
//! crate never reaches back up to either.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod error;
pub mod merkle;
pub mod store;
pub mod trail;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use merkle::{Direction, MerkleProof, MerkleTree};
pub use store::Store;
pub use trail::AuditTrail;
pub use types::{AppendReceipt, AuditEntry, ChainVerification};
