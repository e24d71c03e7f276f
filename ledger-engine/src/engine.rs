//! The ledger engine's write and read paths (C5)

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock_manager::LockManager;
use crate::metrics::Metrics;
use crate::storage::Storage;
use crate::types::{BalanceSnapshot, EntryDraft, EntryStatus, EntryType, LedgerEntry};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

fn account_key(account_id: &str) -> (String, String) {
    ("account".to_string(), account_id.to_string())
}

/// The append-only ledger: per-account locking, batch atomicity,
/// snapshots, and rollback-by-reversal.
pub struct LedgerEngine {
    storage: Arc<Storage>,
    locks: Arc<LockManager>,
    config: Config,
    metrics: Arc<Metrics>,
}

impl LedgerEngine {
    /// Open a ledger engine rooted at `config.data_dir`.
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let locks = Arc::new(LockManager::new(config.lock_ttl_ms));
        let metrics = Arc::new(Metrics::new().map_err(|e| Error::Storage(e.to_string()))?);
        Ok(Self { storage, locks, config, metrics })
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.config.lock_timeout_ms)
    }

    /// Current balance, optionally as of a given monotonic `sequence`
    /// rather than the present (historical query). `at` is inclusive.
    pub fn balance(&self, account_id: &str, currency: &str, at: Option<u64>) -> Result<Decimal> {
        let at_sequence = at.unwrap_or(u64::MAX);
        let snapshot = self.storage.latest_snapshot_at_or_before(account_id, currency, at_sequence)?;
        let (base_balance, from_sequence) = match &snapshot {
            Some(s) => (s.balance, s.last_sequence),
            None => (Decimal::ZERO, 0),
        };

        let entries = self.storage.scan_account(account_id, currency, from_sequence, at_sequence)?;
        let mut balance = base_balance;
        for entry in &entries {
            if entry.status == EntryStatus::Confirmed {
                balance = entry.running_balance;
            }
        }
        let _ = snapshot;
        Ok(balance)
    }

    /// Write a single entry, end to end: lock, validate, compute
    /// `running_balance`, append, maybe snapshot, unlock.
    pub async fn create_entry(&self, draft: EntryDraft, holder_id: &str) -> Result<LedgerEntry> {
        let key = account_key(&draft.account_id);
        self.locks.acquire(key.clone(), holder_id, self.lock_timeout()).await?;
        let result = self.create_entry_locked(draft);
        self.locks.release(key, holder_id);
        result
    }

    fn create_entry_locked(&self, draft: EntryDraft) -> Result<LedgerEntry> {
        if draft.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount);
        }

        let current_balance = self
            .storage
            .latest_entry(&draft.account_id, &draft.currency)?
            .map(|e| e.running_balance)
            .unwrap_or(Decimal::ZERO);

        if matches!(draft.entry_type, EntryType::Debit | EntryType::Fee) {
            let required = draft.amount + draft.fee;
            if current_balance < required {
                return Err(Error::InsufficientBalance {
                    available: current_balance.to_string(),
                    required: required.to_string(),
                });
            }
        }

        let signed_delta = draft.signed_amount();
        let running_balance = current_balance + signed_delta;
        let sequence = self.storage.next_sequence();
        let now = chrono::Utc::now();

        let entry = LedgerEntry {
            entry_id: Uuid::new_v4(),
            tx_id: draft.tx_id,
            account_id: draft.account_id.clone(),
            entry_type: draft.entry_type,
            amount: draft.amount,
            fee: draft.fee,
            running_balance,
            currency: draft.currency.clone(),
            chain: draft.chain,
            chain_tx_hash: draft.chain_tx_hash,
            block_number: draft.block_number,
            audit_anchor: draft.audit_anchor,
            status: EntryStatus::Confirmed,
            created_at: now,
            confirmed_at: Some(now),
            metadata: draft.metadata,
            sequence,
        };

        self.storage.append_entry(&entry)?;
        self.metrics.record_entry_appended(&entry.entry_type);

        let counter = self.storage.increment_counter(&draft.account_id, &draft.currency)?;
        if counter % self.config.snapshot_interval == 0 {
            self.write_snapshot(&entry)?;
        }

        Ok(entry)
    }

    fn write_snapshot(&self, entry: &LedgerEntry) -> Result<()> {
        let snapshot = BalanceSnapshot {
            snapshot_id: Uuid::new_v4(),
            account_id: entry.account_id.clone(),
            currency: entry.currency.clone(),
            balance: entry.running_balance,
            last_entry_id: entry.entry_id,
            last_sequence: entry.sequence,
            entry_count: entry.sequence,
            created_at: chrono::Utc::now(),
        };
        self.storage.put_snapshot(&snapshot)?;
        self.metrics.record_snapshot_written();
        info!(account_id = %entry.account_id, sequence = entry.sequence, "balance snapshot written");
        Ok(())
    }

    /// Write every draft in `drafts` atomically: all succeed, or none
    /// are left observable. Locks on every distinct account are
    /// acquired up front, sorted, so overlapping batches never deadlock.
    pub async fn create_batch(&self, drafts: Vec<EntryDraft>, holder_id: &str) -> Result<Vec<LedgerEntry>> {
        let keys: Vec<_> = drafts.iter().map(|d| account_key(&d.account_id)).collect();
        let held = self.locks.acquire_sorted(keys, holder_id, self.lock_timeout()).await?;

        let mut written = Vec::with_capacity(drafts.len());
        let mut failure = None;

        for draft in drafts {
            match self.create_entry_locked(draft) {
                Ok(entry) => written.push(entry),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            warn!(error = %err, "batch failed, reversing already-written entries");
            for entry in written.iter().rev() {
                if let Err(reverse_err) = self.reverse_entry_locked(entry) {
                    tracing::error!(
                        entry_id = %entry.entry_id,
                        error = %reverse_err,
                        "failed to reverse entry during batch rollback"
                    );
                }
            }
            self.locks.release_all(&held, holder_id);
            return Err(Error::BatchProcessingFailed(err.to_string()));
        }

        self.locks.release_all(&held, holder_id);
        Ok(written)
    }

    /// Reverse a previously confirmed entry: append an opposite-sign
    /// entry referencing the original, then flip the original's status
    /// to `reversed`. The original row is never otherwise mutated
    /// (Invariant B).
    pub async fn rollback_entry(&self, entry_id: Uuid, holder_id: &str) -> Result<LedgerEntry> {
        let original = self.storage.get_entry(entry_id)?;
        let key = account_key(&original.account_id);
        self.locks.acquire(key.clone(), holder_id, self.lock_timeout()).await?;
        let result = self.reverse_entry_locked(&original);
        self.locks.release(key, holder_id);
        result
    }

    fn reverse_entry_locked(&self, original: &LedgerEntry) -> Result<LedgerEntry> {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("original_entry_id".to_string(), original.entry_id.to_string());

        let opposite_sign = if original.signed_amount_is_negative() { 1 } else { -1 };

        let draft = EntryDraft {
            tx_id: original.tx_id,
            account_id: original.account_id.clone(),
            entry_type: EntryType::Reversal,
            amount: original.amount,
            fee: original.fee,
            currency: original.currency.clone(),
            chain: original.chain.clone(),
            chain_tx_hash: original.chain_tx_hash.clone(),
            block_number: original.block_number,
            audit_anchor: None,
            metadata,
            explicit_sign: Some(opposite_sign),
        };

        let reversal = self.create_entry_locked(draft)?;

        let mut flipped = original.clone();
        flipped.status = EntryStatus::Reversed;
        self.storage.put_entry(&flipped)?;

        Ok(reversal)
    }

    /// Fetch a single entry by id.
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        self.storage.get_entry(entry_id)
    }

    /// Every entry carrying a `chain_tx_hash`, across all accounts —
    /// feeds the reconciliation engine's classification pass.
    pub fn entries_with_chain_tx(&self) -> Result<Vec<LedgerEntry>> {
        self.storage.entries_with_chain_tx()
    }

    /// Shared metrics handle, for composition-root wiring into an HTTP
    /// metrics endpoint.
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }
}

impl LedgerEntry {
    fn signed_amount_is_negative(&self) -> bool {
        matches!(self.entry_type, EntryType::Debit | EntryType::Fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_engine() -> (LedgerEngine, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        config.snapshot_interval = 3;
        (LedgerEngine::open(config).unwrap(), dir)
    }

    fn draft(account_id: &str, entry_type: EntryType, amount: i64) -> EntryDraft {
        EntryDraft {
            tx_id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            entry_type,
            amount: Decimal::new(amount, 2),
            fee: Decimal::ZERO,
            currency: "USD".to_string(),
            chain: None,
            chain_tx_hash: None,
            block_number: None,
            audit_anchor: None,
            metadata: Default::default(),
            explicit_sign: None,
        }
    }

    #[tokio::test]
    async fn credit_then_debit_tracks_balance() {
        let (engine, _dir) = test_engine();
        engine.create_entry(draft("sub_a1", EntryType::Credit, 10_000), "writer-1").await.unwrap();
        let entry = engine.create_entry(draft("sub_a1", EntryType::Debit, 4_000), "writer-1").await.unwrap();
        assert_eq!(entry.running_balance, Decimal::new(6_000, 2));
    }

    #[tokio::test]
    async fn debit_beyond_balance_is_rejected() {
        let (engine, _dir) = test_engine();
        engine.create_entry(draft("sub_a1", EntryType::Credit, 1_000), "writer-1").await.unwrap();
        let result = engine.create_entry(draft("sub_a1", EntryType::Debit, 5_000), "writer-1").await;
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
    }

    #[tokio::test]
    async fn rollback_restores_prior_balance() {
        let (engine, _dir) = test_engine();
        engine.create_entry(draft("sub_a1", EntryType::Credit, 10_000), "writer-1").await.unwrap();
        let debit = engine.create_entry(draft("sub_a1", EntryType::Debit, 4_000), "writer-1").await.unwrap();
        assert_eq!(debit.running_balance, Decimal::new(6_000, 2));

        let reversal = engine.rollback_entry(debit.entry_id, "writer-1").await.unwrap();
        assert_eq!(reversal.running_balance, Decimal::new(10_000, 2));

        let original = engine.get_entry(debit.entry_id).unwrap();
        assert_eq!(original.status, EntryStatus::Reversed);
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let (engine, _dir) = test_engine();
        engine.create_entry(draft("sub_a1", EntryType::Credit, 1_000), "writer-1").await.unwrap();

        let drafts = vec![
            draft("sub_a1", EntryType::Debit, 600),
            draft("sub_a1", EntryType::Debit, 500),
        ];
        let result = engine.create_batch(drafts, "batch-1").await;
        assert!(result.is_err());

        let balance = engine.balance("sub_a1", "USD", None).unwrap();
        assert_eq!(balance, Decimal::new(1_000, 2));
    }

    #[tokio::test]
    async fn batch_over_distinct_accounts_all_commit() {
        let (engine, _dir) = test_engine();
        engine.create_entry(draft("sub_a1", EntryType::Credit, 1_000), "writer-1").await.unwrap();
        engine.create_entry(draft("sub_a2", EntryType::Credit, 1_000), "writer-1").await.unwrap();

        let drafts = vec![
            draft("sub_a1", EntryType::Debit, 200),
            draft("sub_a2", EntryType::Debit, 300),
        ];
        let written = engine.create_batch(drafts, "batch-1").await.unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(engine.balance("sub_a1", "USD", None).unwrap(), Decimal::new(800, 2));
        assert_eq!(engine.balance("sub_a2", "USD", None).unwrap(), Decimal::new(700, 2));
    }

    #[tokio::test]
    async fn finds_entries_carrying_a_chain_tx_hash() {
        let (engine, _dir) = test_engine();
        engine.create_entry(draft("sub_a1", EntryType::Credit, 1_000), "writer-1").await.unwrap();

        let mut tagged = draft("sub_a1", EntryType::Debit, 500);
        tagged.chain_tx_hash = Some("0xabc".to_string());
        engine.create_entry(tagged, "writer-1").await.unwrap();

        let found = engine.entries_with_chain_tx().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].chain_tx_hash.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn snapshot_written_on_interval() {
        let (engine, _dir) = test_engine();
        for _ in 0..3 {
            engine.create_entry(draft("sub_a1", EntryType::Credit, 100), "writer-1").await.unwrap();
        }
        let snapshot = engine
            .storage
            .latest_snapshot_at_or_before("sub_a1", "USD", u64::MAX)
            .unwrap();
        assert!(snapshot.is_some());
    }
}
