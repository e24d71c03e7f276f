//! Abstract interfaces to external collaborators (`spec.md §6`)
//!
//! Every external system this platform touches — signer, chain RPC,
//! compliance vendor, KYC vendor, sanctions vendor, fiat treasury,
//! audit store, chain anchor, ledger store — is reached exclusively
//! through one of these traits. Implementations are selected once at
//! process start and held as `Arc<dyn Trait>`; nothing here is swapped
//! at runtime, so the traits need only be object-safe, not cheap to
//! reconstruct.

use crate::error::PortError;
use crate::mandate::{Payment, ProofAlgorithm};
use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result type every port method returns.
pub type PortResult<T> = Result<T, PortError>;

/// Signs and verifies payloads on behalf of a key the platform does not
/// hold directly (remote MPC signer, HSM, or local dev keystore).
#[async_trait]
pub trait SigningPort: Send + Sync {
    /// Sign `payload` under `key_id`, returning an algorithm-tagged signature.
    async fn sign(&self, payload: &[u8], key_id: &str) -> PortResult<Vec<u8>>;

    /// Verify `signature` over `payload` against `public_key` using `algorithm`.
    async fn verify(
        &self,
        payload: &[u8],
        signature: &[u8],
        public_key: &[u8],
        algorithm: ProofAlgorithm,
    ) -> PortResult<bool>;
}

/// Gas price tier estimate, in native token and USD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasEstimate {
    pub low: Money,
    pub med: Money,
    pub high: Money,
}

/// Result of dispatching a payment to a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub tx_hash: String,
    pub chain: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub audit_anchor: Option<String>,
}

/// A transaction as reported back by a chain RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTx {
    pub tx_hash: String,
    pub chain: String,
    pub status: String,
    pub block_number: Option<u64>,
    pub amount_minor: i128,
    pub token: String,
    pub destination: String,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// A newly provisioned custodial or delegated wallet handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletHandle {
    pub address: String,
    pub key_handle: String,
}

/// Submits payments to a blockchain and reads back confirmation state.
#[async_trait]
pub trait ChainExecutorPort: Send + Sync {
    /// Submit a verified payment mandate for on-chain settlement.
    async fn dispatch(&self, payment: &Payment) -> PortResult<DispatchReceipt>;

    /// Estimate gas cost for a prospective transfer.
    async fn estimate_gas(&self, to: &str, amount: &Money, token: &str) -> PortResult<GasEstimate>;

    /// Look up a transaction by hash; `None` if the chain has no record of it.
    async fn get_transaction(&self, hash: &str) -> PortResult<Option<ChainTx>>;

    /// Provision a new wallet address and its key handle.
    async fn create_wallet(&self) -> PortResult<WalletHandle>;
}

/// Lifecycle status of a crypto-to-fiat off-ramp session, supplemental
/// to `spec.md §6`'s named port list (grounded in
/// `sardis_core/fiat_orchestrator.py`'s crypto→card flow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampStatus {
    Pending,
    Completed,
    Failed,
}

/// A crypto-to-fiat off-ramp session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RampSession {
    pub session_id: String,
    pub status: RampStatus,
}

/// Converts on-chain value into fiat the treasury can hold, via an
/// off-ramp vendor. The orchestrator never credits a sub-ledger balance
/// until a session reports `Completed`.
#[async_trait]
pub trait RampPort: Send + Sync {
    /// Open a new off-ramp session for `amount` of on-chain value.
    async fn create_session(&self, amount: &Money, source_address: &str) -> PortResult<RampSession>;

    /// Poll a previously created session's current status.
    async fn get_session_status(&self, session_id: &str) -> PortResult<RampSession>;
}

/// Outcome of a compliance rule evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub rule_id: String,
    pub provider: String,
}

/// Evaluates a mandate against a vendor's compliance rule set.
#[async_trait]
pub trait ComplianceProviderPort: Send + Sync {
    /// Evaluate `mandate_json` (canonical JSON of the mandate chain under review).
    async fn evaluate(&self, mandate_json: &[u8]) -> PortResult<ComplianceDecision>;
}

/// KYC inquiry lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotStarted,
    Pending,
    Approved,
    Declined,
    Expired,
    NeedsReview,
}

/// A newly created KYC inquiry session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycSession {
    pub inquiry_id: String,
    pub redirect_url: Option<String>,
}

/// Point-in-time KYC check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycCheck {
    pub status: KycStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl KycCheck {
    /// An `approved` result is reported `expired` once past `expires_at`,
    /// per the platform's own clock rather than the vendor's.
    pub fn effective_status(&self, now: DateTime<Utc>) -> KycStatus {
        if self.status == KycStatus::Approved {
            if let Some(expires_at) = self.expires_at {
                if expires_at < now {
                    return KycStatus::Expired;
                }
            }
        }
        self.status
    }

    /// Whether a fresh vendor check should be requested.
    pub fn needs_reverification(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == KycStatus::Expired
    }
}

/// Identity verification against a KYC vendor.
#[async_trait]
pub trait KycPort: Send + Sync {
    /// Start a new KYC inquiry for the given subject request payload.
    async fn create_inquiry(&self, request_json: &[u8]) -> PortResult<KycSession>;

    /// Fetch the current status of a previously created inquiry.
    async fn get_status(&self, inquiry_id: &str) -> PortResult<KycCheck>;

    /// Verify an inbound webhook's signature before trusting its payload.
    async fn verify_webhook(&self, payload: &[u8], signature: &[u8]) -> PortResult<bool>;
}

/// Outcome of a sanctions screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanctionsResult {
    pub risk: f64,
    pub is_sanctioned: bool,
    pub matches: Vec<String>,
    pub reason: Option<String>,
}

/// Screens wallets and transactions against sanctions lists.
#[async_trait]
pub trait SanctionsPort: Send + Sync {
    /// Screen a standalone wallet address.
    async fn screen_wallet(&self, address: &str, chain: &str) -> PortResult<SanctionsResult>;

    /// Screen a specific transfer's parties and amount.
    async fn screen_transaction(
        &self,
        from: &str,
        to: &str,
        amount: &Money,
        token: &str,
    ) -> PortResult<SanctionsResult>;
}

/// Status of an outbound fiat transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryTransfer {
    pub id: String,
    pub status: String,
}

/// The platform's fiat holding account at an external bank/BaaS provider.
#[async_trait]
pub trait TreasuryPort: Send + Sync {
    /// Current reported balance of the platform-wide fiat account.
    async fn get_balance(&self) -> PortResult<Money>;

    /// Create an outbound payment to an external destination.
    async fn create_outbound_payment(
        &self,
        amount: &Money,
        destination: &str,
    ) -> PortResult<TreasuryTransfer>;

    /// Move funds from the holding balance into the issuing balance.
    async fn fund_issuing_balance(&self, amount: &Money) -> PortResult<TreasuryTransfer>;

    /// Handle an inbound webhook notification, returning whether it was accepted.
    async fn handle_webhook(&self, payload: &[u8], signature: &[u8]) -> PortResult<bool>;
}

/// Acknowledgement of a durable audit append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendReceipt {
    pub entry_id: String,
    pub entry_hash: [u8; 32],
    pub sequence: u64,
}

/// Durable, hash-chained append-only store for audit entries.
#[async_trait]
pub trait AuditStorePort: Send + Sync {
    /// Append a pre-serialized, pre-hashed entry.
    async fn append(&self, entry_json: &[u8], entry_hash: [u8; 32]) -> PortResult<AppendReceipt>;

    /// Fetch a previously appended entry by id.
    async fn get(&self, id: &str) -> PortResult<Option<Vec<u8>>>;

    /// Walk the whole chain verifying each link; returns the first break, if any.
    async fn verify_chain(&self) -> PortResult<(bool, Option<String>)>;
}

/// Proof that a Merkle root was committed on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub tx_hash: String,
    pub chain: String,
    pub block: Option<u64>,
}

/// Optional periodic commitment of the audit trail's Merkle root to a chain.
#[async_trait]
pub trait AnchorPort: Send + Sync {
    /// Anchor a 32-byte Merkle root, returning the commitment receipt.
    async fn anchor(&self, root: [u8; 32]) -> PortResult<AnchorReceipt>;
}

/// Opaque filter passed through to a ledger store's query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerEntryFilter {
    pub account_id: Option<String>,
    pub payment_id: Option<String>,
    pub chain_tx_hash: Option<String>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

/// Page request/response cursor for ledger entry queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    pub cursor: Option<String>,
    pub limit: u32,
}

/// A page of results plus the cursor to continue from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// A balance snapshot taken at a point in the ledger's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub account_id: String,
    pub as_of: DateTime<Utc>,
    pub available_minor: i128,
    pub pending_minor: i128,
    pub held_minor: i128,
}

/// Queryable persistence for ledger entries, independent of the
/// hash-chained audit store.
#[async_trait]
pub trait LedgerStorePort: Send + Sync {
    /// Insert a pre-serialized ledger entry.
    async fn insert_entry(&self, entry_json: &[u8]) -> PortResult<String>;

    /// Query entries matching `filter`, paginated.
    async fn query_entries(
        &self,
        filter: &LedgerEntryFilter,
        paging: &Paging,
    ) -> PortResult<Page<Vec<u8>>>;

    /// Replace or insert a balance snapshot.
    async fn upsert_snapshot(&self, snapshot: &Snapshot) -> PortResult<()>;

    /// Fetch the most recent snapshot at or before `at`.
    async fn get_snapshot_at_or_before(
        &self,
        account_id: &str,
        at: DateTime<Utc>,
    ) -> PortResult<Option<Snapshot>>;
}
