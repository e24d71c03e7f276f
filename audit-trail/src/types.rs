//! Audit trail entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single hash-chained, immutable audit record.
///
/// `record_hash` identifies the record's own content (either this
/// crate's canonical `event_type`/`payload` hash, or a caller-supplied
/// hash for opaque records appended through `AuditStorePort`).
/// `entry_hash` is this chain's link hash, `SHA256(record_hash || prev_hash)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: Uuid,
    /// Which subsystem/event this records, e.g. `"ledger.entry.created"`.
    pub event_type: String,
    /// Raw payload bytes. Native callers pass canonical JSON; opaque
    /// `AuditStorePort` callers pass whatever they already serialized.
    pub payload: Vec<u8>,
    pub chain_position: u64,
    pub record_hash: [u8; 32],
    /// SHA-256 of the previous entry's `entry_hash`, or all-zero for the first entry.
    pub prev_hash: [u8; 32],
    /// `SHA256(record_hash || prev_hash)`.
    pub entry_hash: [u8; 32],
    pub recorded_at: DateTime<Utc>,
}

/// Returned from `AuditTrail::append`: where the entry landed and how
/// to prove it's really there.
#[derive(Debug, Clone)]
pub struct AppendReceipt {
    pub entry_id: Uuid,
    pub chain_position: u64,
    pub entry_hash: [u8; 32],
    pub proof: crate::merkle::MerkleProof,
}

/// Result of walking the whole chain recomputing hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerification {
    Intact,
    Broken { at_entry_id: Uuid, chain_position: u64 },
}
