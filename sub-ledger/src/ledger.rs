//! The sub-ledger (C4): per-agent available/pending/held balances
//! embedded in the platform treasury

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Balances, Bucket, Operation, ReconcileReport, SubLedgerAccount, TransactionRecord};
use ledger_engine::{EntryDraft, EntryType, LedgerEngine};
use ports::traits::TreasuryPort;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Wraps a ledger engine with the three-bucket accounting model and an
/// account registry; every mutation is a single ledger-engine write (or
/// a two-entry batch when a bucket-to-bucket move must be atomic), so
/// C5's lock manager remains the only place mutation serializes.
pub struct SubLedger {
    ledger: Arc<LedgerEngine>,
    store: Store,
    config: crate::config::Config,
}

fn bucket_account(agent_account_id: &str, bucket: Bucket) -> String {
    format!("{agent_account_id}:{}", bucket.suffix())
}

impl SubLedger {
    pub fn open(ledger: Arc<LedgerEngine>, config: crate::config::Config) -> Result<Self> {
        let store = Store::open(&config)?;
        Ok(Self { ledger, store, config })
    }

    pub fn create_account(&self, agent_id: &str) -> Result<SubLedgerAccount> {
        if self.store.account_exists(agent_id)? {
            return Err(Error::AccountExists(agent_id.to_string()));
        }
        let now = chrono::Utc::now();
        let account = SubLedgerAccount {
            agent_id: agent_id.to_string(),
            currency: self.config.default_currency.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.put_account(&account)?;
        Ok(account)
    }

    /// Current `{available, pending, held}` for `agent_id`.
    pub fn balances(&self, agent_id: &str) -> Result<Balances> {
        let account = self.store.get_account(agent_id)?;
        let agent_account_id = account.account_id();
        let available = self.ledger.balance(&bucket_account(&agent_account_id, Bucket::Available), &account.currency, None)?;
        let pending = self.ledger.balance(&bucket_account(&agent_account_id, Bucket::Pending), &account.currency, None)?;
        let held = self.ledger.balance(&bucket_account(&agent_account_id, Bucket::Held), &account.currency, None)?;
        Ok(Balances { available, pending, held })
    }

    fn draft(
        account_id: String,
        currency: String,
        entry_type: EntryType,
        amount: Decimal,
        reference: Option<&str>,
        description: Option<&str>,
    ) -> EntryDraft {
        let mut metadata = std::collections::HashMap::new();
        if let Some(r) = reference {
            metadata.insert("reference".to_string(), r.to_string());
        }
        if let Some(d) = description {
            metadata.insert("description".to_string(), d.to_string());
        }
        EntryDraft {
            tx_id: Uuid::new_v4(),
            account_id,
            entry_type,
            amount,
            fee: Decimal::ZERO,
            currency,
            chain: None,
            chain_tx_hash: None,
            block_number: None,
            audit_anchor: None,
            metadata,
            explicit_sign: None,
        }
    }

    async fn record_tx(&self, agent_id: &str, operation: Operation, amount: Decimal, reference: Option<String>, description: Option<String>) -> Result<TransactionRecord> {
        let balance_after = self.balances(agent_id)?;
        let record = TransactionRecord {
            record_id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            operation,
            amount,
            balance_after,
            reference,
            description,
            created_at: chrono::Utc::now(),
        };
        self.store.append_tx_record(&record)?;
        let mut account = self.store.get_account(agent_id)?;
        account.updated_at = record.created_at;
        self.store.put_account(&account)?;
        Ok(record)
    }

    pub async fn deposit(&self, agent_id: &str, amount: Decimal, reference: Option<&str>, description: Option<&str>) -> Result<TransactionRecord> {
        let account = self.store.get_account(agent_id)?;
        let available_id = bucket_account(&account.account_id(), Bucket::Available);
        let draft = Self::draft(available_id, account.currency.clone(), EntryType::Credit, amount, reference, description);
        self.ledger.create_entry(draft, &format!("sub_ledger:{agent_id}")).await?;
        self.record_tx(agent_id, Operation::Deposit, amount, reference.map(String::from), description.map(String::from)).await
    }

    pub async fn withdraw(&self, agent_id: &str, amount: Decimal, reference: Option<&str>, description: Option<&str>) -> Result<TransactionRecord> {
        let account = self.store.get_account(agent_id)?;
        let balances = self.balances(agent_id)?;
        if balances.available < amount {
            return Err(Error::InsufficientAvailable {
                available: balances.available.to_string(),
                required: amount.to_string(),
            });
        }
        let available_id = bucket_account(&account.account_id(), Bucket::Available);
        let draft = Self::draft(available_id, account.currency.clone(), EntryType::Debit, amount, reference, description);
        self.ledger.create_entry(draft, &format!("sub_ledger:{agent_id}")).await?;
        self.record_tx(agent_id, Operation::Withdraw, amount, reference.map(String::from), description.map(String::from)).await
    }

    /// `available -= amount; held += amount`, atomically via a ledger-engine batch.
    pub async fn hold_for_card(&self, agent_id: &str, amount: Decimal, card_id: &str) -> Result<TransactionRecord> {
        let account = self.store.get_account(agent_id)?;
        let balances = self.balances(agent_id)?;
        if balances.available < amount {
            return Err(Error::InsufficientAvailable {
                available: balances.available.to_string(),
                required: amount.to_string(),
            });
        }
        let agent_account_id = account.account_id();
        let drafts = vec![
            Self::draft(bucket_account(&agent_account_id, Bucket::Available), account.currency.clone(), EntryType::Debit, amount, Some(card_id), Some("hold for card")),
            Self::draft(bucket_account(&agent_account_id, Bucket::Held), account.currency.clone(), EntryType::Credit, amount, Some(card_id), Some("hold for card")),
        ];
        self.ledger.create_batch(drafts, &format!("sub_ledger:{agent_id}")).await?;
        self.record_tx(agent_id, Operation::HoldForCard, amount, Some(card_id.to_string()), None).await
    }

    /// `held -= amount; available += amount`, atomically.
    pub async fn release_hold(&self, agent_id: &str, amount: Decimal, card_id: &str) -> Result<TransactionRecord> {
        let account = self.store.get_account(agent_id)?;
        let balances = self.balances(agent_id)?;
        if balances.held < amount {
            return Err(Error::InsufficientHeld {
                held: balances.held.to_string(),
                required: amount.to_string(),
            });
        }
        let agent_account_id = account.account_id();
        let drafts = vec![
            Self::draft(bucket_account(&agent_account_id, Bucket::Held), account.currency.clone(), EntryType::Debit, amount, Some(card_id), Some("release hold")),
            Self::draft(bucket_account(&agent_account_id, Bucket::Available), account.currency.clone(), EntryType::Credit, amount, Some(card_id), Some("release hold")),
        ];
        self.ledger.create_batch(drafts, &format!("sub_ledger:{agent_id}")).await?;
        self.record_tx(agent_id, Operation::ReleaseHold, amount, Some(card_id.to_string()), None).await
    }

    /// `held -= amount`; funds permanently leave the agent.
    pub async fn settle_card(&self, agent_id: &str, amount: Decimal, card_id: &str, ext_tx_id: &str) -> Result<TransactionRecord> {
        let account = self.store.get_account(agent_id)?;
        let balances = self.balances(agent_id)?;
        if balances.held < amount {
            return Err(Error::InsufficientHeld {
                held: balances.held.to_string(),
                required: amount.to_string(),
            });
        }
        let held_id = bucket_account(&account.account_id(), Bucket::Held);
        let draft = Self::draft(held_id, account.currency.clone(), EntryType::Debit, amount, Some(card_id), Some(ext_tx_id));
        self.ledger.create_entry(draft, &format!("sub_ledger:{agent_id}")).await?;
        self.record_tx(agent_id, Operation::SettleCard, amount, Some(ext_tx_id.to_string()), Some(card_id.to_string())).await
    }

    /// Invariant E: Σ over all sub-accounts equals the treasury's reported balance.
    pub async fn reconcile(&self, treasury: &dyn TreasuryPort) -> Result<ReconcileReport> {
        let treasury_money = treasury.get_balance().await.map_err(|e| Error::Treasury(e.to_string()))?;

        let mut sub_ledger_total = Decimal::ZERO;
        for account in self.store.all_accounts()? {
            let balances = self.balances(&account.agent_id)?;
            sub_ledger_total += balances.total();
        }

        let diff = (treasury_money.amount - sub_ledger_total).abs();
        let tolerance = Decimal::new(self.config.reconcile_tolerance_minor, treasury_money.amount.scale().max(2));
        Ok(ReconcileReport {
            treasury_balance: treasury_money.amount,
            sub_ledger_total,
            diff,
            reconciled: diff < tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledger_engine::Config as LedgerConfig;
    use ports::error::PortError;
    use ports::money::Money;
    use ports::traits::{PortResult, TreasuryTransfer};
    use tempfile::TempDir;

    fn test_sub_ledger() -> (SubLedger, TempDir, TempDir) {
        let ledger_dir = TempDir::new().unwrap();
        let sub_dir = TempDir::new().unwrap();

        let mut ledger_config = LedgerConfig::default();
        ledger_config.data_dir = ledger_dir.path().to_path_buf();
        let ledger = Arc::new(LedgerEngine::open(ledger_config).unwrap());

        let mut config = crate::config::Config::default();
        config.data_dir = sub_dir.path().to_path_buf();
        let sub_ledger = SubLedger::open(ledger, config).unwrap();
        (sub_ledger, ledger_dir, sub_dir)
    }

    struct FakeTreasury {
        balance: Decimal,
    }

    #[async_trait]
    impl TreasuryPort for FakeTreasury {
        async fn get_balance(&self) -> PortResult<Money> {
            Ok(Money { amount: self.balance, currency: ports::money::Currency::new("USD") })
        }
        async fn create_outbound_payment(&self, _amount: &Money, _destination: &str) -> PortResult<TreasuryTransfer> {
            Ok(TreasuryTransfer { id: "tr_1".to_string(), status: "completed".to_string() })
        }
        async fn fund_issuing_balance(&self, _amount: &Money) -> PortResult<TreasuryTransfer> {
            Ok(TreasuryTransfer { id: "tr_2".to_string(), status: "completed".to_string() })
        }
        async fn handle_webhook(&self, _payload: &[u8], _signature: &[u8]) -> PortResult<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn deposit_and_withdraw_track_available() {
        let (sub, _ld, _sd) = test_sub_ledger();
        sub.create_account("agent-1").unwrap();
        sub.deposit("agent-1", Decimal::new(10_000, 2), None, None).await.unwrap();
        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.available, Decimal::new(10_000, 2));

        sub.withdraw("agent-1", Decimal::new(4_000, 2), None, None).await.unwrap();
        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.available, Decimal::new(6_000, 2));
    }

    #[tokio::test]
    async fn withdraw_beyond_available_is_rejected() {
        let (sub, _ld, _sd) = test_sub_ledger();
        sub.create_account("agent-1").unwrap();
        sub.deposit("agent-1", Decimal::new(1_000, 2), None, None).await.unwrap();
        let result = sub.withdraw("agent-1", Decimal::new(5_000, 2), None, None).await;
        assert!(matches!(result, Err(Error::InsufficientAvailable { .. })));
    }

    #[tokio::test]
    async fn hold_and_release_move_between_buckets() {
        let (sub, _ld, _sd) = test_sub_ledger();
        sub.create_account("agent-1").unwrap();
        sub.deposit("agent-1", Decimal::new(10_000, 2), None, None).await.unwrap();

        sub.hold_for_card("agent-1", Decimal::new(3_000, 2), "card_1").await.unwrap();
        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.available, Decimal::new(7_000, 2));
        assert_eq!(balances.held, Decimal::new(3_000, 2));

        sub.release_hold("agent-1", Decimal::new(1_000, 2), "card_1").await.unwrap();
        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.available, Decimal::new(8_000, 2));
        assert_eq!(balances.held, Decimal::new(2_000, 2));
    }

    #[tokio::test]
    async fn settle_card_permanently_removes_held_funds() {
        let (sub, _ld, _sd) = test_sub_ledger();
        sub.create_account("agent-1").unwrap();
        sub.deposit("agent-1", Decimal::new(10_000, 2), None, None).await.unwrap();
        sub.hold_for_card("agent-1", Decimal::new(3_000, 2), "card_1").await.unwrap();
        sub.settle_card("agent-1", Decimal::new(3_000, 2), "card_1", "ext_tx_1").await.unwrap();

        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.held, Decimal::ZERO);
        assert_eq!(balances.total(), Decimal::new(7_000, 2));
    }

    #[tokio::test]
    async fn reconcile_reports_balanced_books() {
        let (sub, _ld, _sd) = test_sub_ledger();
        sub.create_account("agent-1").unwrap();
        sub.deposit("agent-1", Decimal::new(10_000, 2), None, None).await.unwrap();

        let treasury = FakeTreasury { balance: Decimal::new(10_000, 2) };
        let report = sub.reconcile(&treasury).await.unwrap();
        assert!(report.reconciled);
        assert_eq!(report.diff, Decimal::ZERO);
    }

    #[tokio::test]
    async fn reconcile_reports_drift() {
        let (sub, _ld, _sd) = test_sub_ledger();
        sub.create_account("agent-1").unwrap();
        sub.deposit("agent-1", Decimal::new(10_000, 2), None, None).await.unwrap();

        let treasury = FakeTreasury { balance: Decimal::new(10_500, 2) };
        let report = sub.reconcile(&treasury).await.unwrap();
        assert!(!report.reconciled);
    }
}
