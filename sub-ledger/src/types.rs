//! Sub-ledger account and transaction record types (`spec.md §4.4`, C4)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-agent account registered with the sub-ledger. The three balances
/// themselves are not stored here — they live as ledger-engine entries
/// on this account's three underlying sub-accounts — this struct is
/// just the registration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubLedgerAccount {
    pub agent_id: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubLedgerAccount {
    pub fn account_id(&self) -> String {
        format!("sub_{}", self.agent_id)
    }
}

/// Which of the three balance buckets a ledger sub-account tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Available,
    Pending,
    Held,
}

impl Bucket {
    pub fn suffix(self) -> &'static str {
        match self {
            Bucket::Available => "available",
            Bucket::Pending => "pending",
            Bucket::Held => "held",
        }
    }
}

/// A snapshot of an agent's three balances at a point in time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Balances {
    pub available: Decimal,
    pub pending: Decimal,
    pub held: Decimal,
}

impl Balances {
    pub fn total(&self) -> Decimal {
        self.available + self.pending + self.held
    }
}

/// An operation recorded in the sub-ledger's own transaction log,
/// distinct from (and layered on top of) the ledger-engine entries it drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Deposit,
    Withdraw,
    HoldForCard,
    ReleaseHold,
    SettleCard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub record_id: Uuid,
    pub agent_id: String,
    pub operation: Operation,
    pub amount: Decimal,
    pub balance_after: Balances,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of `reconcile()` — Invariant E.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub treasury_balance: Decimal,
    pub sub_ledger_total: Decimal,
    pub diff: Decimal,
    pub reconciled: bool,
}
