//! Settlement mode, batch, and outcome types (`spec.md §4.9`, C9)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a settlement reaches the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    /// Mark confirmed immediately; no chain call at all.
    InternalOnly,
    /// Dispatch synchronously, wrapped by the retryable caller.
    PerTx,
    /// Append to an open per-chain batch; submitted together later.
    Batched,
}

/// Lifecycle status of one settlement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

/// A request to settle one payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub settlement_id: Uuid,
    pub payment: ports::mandate::Payment,
    pub mode_override: Option<SettlementMode>,
}

/// Outcome of attempting to settle a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub settlement_id: Uuid,
    pub status: SettlementStatus,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub batch_id: Option<Uuid>,
    pub failure_reason: Option<String>,
}

impl SettlementOutcome {
    pub(crate) fn confirmed(settlement_id: Uuid, tx_hash: Option<String>, block_number: Option<u64>) -> Self {
        Self { settlement_id, status: SettlementStatus::Confirmed, tx_hash, block_number, batch_id: None, failure_reason: None }
    }

    pub(crate) fn submitted(settlement_id: Uuid, batch_id: Uuid) -> Self {
        Self { settlement_id, status: SettlementStatus::Submitted, tx_hash: None, block_number: None, batch_id: Some(batch_id), failure_reason: None }
    }

    pub(crate) fn failed(settlement_id: Uuid, reason: impl Into<String>) -> Self {
        Self { settlement_id, status: SettlementStatus::Failed, tx_hash: None, block_number: None, batch_id: None, failure_reason: Some(reason.into()) }
    }
}

/// An open accumulation of settlements for one chain, awaiting submission.
#[derive(Debug)]
pub(crate) struct Batch {
    pub batch_id: Uuid,
    pub chain: String,
    pub opened_at: DateTime<Utc>,
    pub requests: Vec<SettlementRequest>,
}

impl Batch {
    pub(crate) fn new(chain: String) -> Self {
        Self { batch_id: Uuid::new_v4(), chain, opened_at: Utc::now(), requests: Vec::new() }
    }
}
