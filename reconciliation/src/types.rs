//! Discrepancy classification and resolution vocabulary (`spec.md §4.8`, C8)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a ledger entry and its matching chain transaction disagree.
///
/// The five spec-named kinds are `MissingOnChain` through `DuplicateEntry`.
/// `TimingDiscrepancy` and `CurrencyMismatch` are supplemental, pulled from
/// the original reconciler's wider enum; callers matching exhaustively
/// should still have a wildcard arm, since this list may grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiscrepancyKind {
    /// Entry carries a `chain_tx_hash` but the chain provider has no record of it.
    MissingOnChain,
    /// A chain transaction to/from a managed address has no matching ledger entry.
    MissingInLedger,
    /// `|ledger − chain| > tolerance · max(ledger, chain)`.
    AmountMismatch,
    /// Chain reports `failed` while the ledger entry is `confirmed`.
    StatusMismatch,
    /// Two distinct ledger entries share one `chain_tx_hash`.
    DuplicateEntry,
    /// Ledger and chain agree on amount and outcome but disagree on when
    /// the transfer settled by more than the configured skew tolerance.
    TimingDiscrepancy,
    /// Ledger entry's `currency`/token does not match the chain
    /// transaction's reported token.
    CurrencyMismatch,
}

/// How a discrepancy was (or will be) resolved.
///
/// `AutoCorrectLedger` and `ManualReview`/`Ignore` are the spec's three
/// strategies. `CreateAdjustment` and `AutoCorrectChain` are supplemental:
/// the former appends a compensating ledger entry distinct from simply
/// flipping a status field, the latter trusts the ledger over the chain
/// (rare, logged at a higher severity than `Ignore`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ResolutionStrategy {
    /// Trust the chain; correct the ledger entry's recorded status/fields.
    AutoCorrectLedger,
    /// Trust the chain; append a compensating ledger entry for the
    /// amount delta rather than mutating the original.
    CreateAdjustment,
    /// Trust the ledger over the chain. Rare; always logged at `warn`.
    AutoCorrectChain,
    /// Queue for a human operator; no automatic mutation.
    ManualReview,
    /// Within tolerance; record and move on.
    Ignore,
}

/// One detected disagreement between the ledger and the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    pub discrepancy_id: Uuid,
    pub kind: DiscrepancyKind,
    pub entry_id: Option<Uuid>,
    pub chain_tx_hash: Option<String>,
    pub ledger_amount_minor: Option<i128>,
    pub chain_amount_minor: Option<i128>,
    pub detail: String,
    pub detected_at: DateTime<Utc>,
}

/// The outcome recorded once a discrepancy has been run through a
/// [`ResolutionStrategy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub discrepancy_id: Uuid,
    pub strategy: ResolutionStrategy,
    pub adjustment_entry_id: Option<Uuid>,
    pub audit_id: String,
    pub resolved_at: DateTime<Utc>,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReconciliationReport {
    pub entries_scanned: u64,
    pub discrepancies: Vec<Discrepancy>,
    pub resolutions: Vec<Resolution>,
}
