//! Ledger entry, snapshot, and lock record types (`spec.md §3`, C5)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// What a ledger entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Credit,
    Debit,
    Transfer,
    Fee,
    Refund,
    Adjustment,
    Reversal,
}

impl EntryType {
    /// Whether this entry type reduces the account balance on its own,
    /// absent a metadata-carried sign override. `Reversal`'s sign is
    /// never inferred from its type — the writer must set it explicitly
    /// via `EntryDraft::signed_amount`, per the Design Notes' flag that
    /// the source conflated a reversal's type with its sign.
    fn reduces_balance(self) -> bool {
        matches!(self, EntryType::Debit | EntryType::Fee)
    }
}

/// Lifecycle status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Confirmed,
    Failed,
    Reversed,
    Cancelled,
}

/// An append-only ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub tx_id: Uuid,
    pub account_id: String,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub fee: Decimal,
    pub running_balance: Decimal,
    pub currency: String,
    pub chain: Option<String>,
    pub chain_tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub audit_anchor: Option<String>,
    pub status: EntryStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub confirmed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub metadata: HashMap<String, String>,
    /// Monotonic insertion sequence, used to break created_at ties and
    /// to order historical balance scans deterministically — the
    /// Design Notes call out timestamp-only ordering as a latent bug
    /// in the source.
    pub sequence: u64,
}

/// Caller-supplied fields for a new entry, before `sequence`,
/// `running_balance`, and `entry_id` are assigned by the engine.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub tx_id: Uuid,
    pub account_id: String,
    pub entry_type: EntryType,
    /// Unsigned magnitude of the entry.
    pub amount: Decimal,
    pub fee: Decimal,
    pub currency: String,
    pub chain: Option<String>,
    pub chain_tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub audit_anchor: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Explicit sign for `Reversal`/`Transfer`/`Adjustment` entries
    /// (a correction can go either direction); ignored for other entry
    /// types, whose sign follows `EntryType::reduces_balance`.
    pub explicit_sign: Option<i8>,
}

impl EntryDraft {
    /// The signed delta this entry applies to `running_balance`.
    pub fn signed_amount(&self) -> Decimal {
        let magnitude = self.amount + self.fee;
        match self.entry_type {
            EntryType::Reversal | EntryType::Transfer | EntryType::Adjustment => {
                match self.explicit_sign {
                    Some(sign) if sign < 0 => -magnitude,
                    _ => magnitude,
                }
            }
            other if other.reduces_balance() => -magnitude,
            _ => magnitude,
        }
    }
}

/// A balance checkpoint written every `snapshot_interval` entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub snapshot_id: Uuid,
    pub account_id: String,
    pub currency: String,
    pub balance: Decimal,
    pub last_entry_id: Uuid,
    pub last_sequence: u64,
    pub entry_count: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
