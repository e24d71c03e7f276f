//! Account registry and transaction log for the sub-ledger
//!
//! # Column families
//!
//! - `accounts` - `agent_id` → [`SubLedgerAccount`]
//! - `tx_records` - `agent_id|created_at(be)|record_id` → [`TransactionRecord`]

use crate::error::{Error, Result};
use crate::types::{SubLedgerAccount, TransactionRecord};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, DB};
use std::sync::Arc;

const CF_ACCOUNTS: &str = "accounts";
const CF_TX_RECORDS: &str = "tx_records";

pub struct Store {
    db: Arc<DB>,
}

impl Store {
    pub fn open(config: &crate::config::Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TX_RECORDS, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {name} not found")))
    }

    pub fn account_exists(&self, agent_id: &str) -> Result<bool> {
        Ok(self.db.get_cf(self.cf(CF_ACCOUNTS)?, agent_id.as_bytes())?.is_some())
    }

    pub fn get_account(&self, agent_id: &str) -> Result<SubLedgerAccount> {
        let raw = self
            .db
            .get_cf(self.cf(CF_ACCOUNTS)?, agent_id.as_bytes())?
            .ok_or_else(|| Error::AccountNotFound(agent_id.to_string()))?;
        Ok(bincode::deserialize(&raw)?)
    }

    pub fn put_account(&self, account: &SubLedgerAccount) -> Result<()> {
        self.db
            .put_cf(self.cf(CF_ACCOUNTS)?, account.agent_id.as_bytes(), bincode::serialize(account)?)?;
        Ok(())
    }

    pub fn all_accounts(&self) -> Result<Vec<SubLedgerAccount>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            accounts.push(bincode::deserialize(&value)?);
        }
        Ok(accounts)
    }

    pub fn append_tx_record(&self, record: &TransactionRecord) -> Result<()> {
        let cf = self.cf(CF_TX_RECORDS)?;
        let mut key = record.agent_id.as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(&record.created_at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        key.extend_from_slice(record.record_id.as_bytes());
        self.db.put_cf(cf, key, bincode::serialize(record)?)?;
        Ok(())
    }

    pub fn tx_records_for(&self, agent_id: &str) -> Result<Vec<TransactionRecord>> {
        let cf = self.cf(CF_TX_RECORDS)?;
        let mut prefix = agent_id.as_bytes().to_vec();
        prefix.push(0);
        let iter = self.db.prefix_iterator_cf(cf, &prefix);

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = crate::config::Config::default();
        config.data_dir = dir.path().to_path_buf();
        (Store::open(&config).unwrap(), dir)
    }

    #[test]
    fn registers_and_fetches_account() {
        let (store, _dir) = test_store();
        let now = chrono::Utc::now();
        let account = SubLedgerAccount {
            agent_id: "agent-1".to_string(),
            currency: "USD".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(!store.account_exists("agent-1").unwrap());
        store.put_account(&account).unwrap();
        assert!(store.account_exists("agent-1").unwrap());
        assert_eq!(store.get_account("agent-1").unwrap().currency, "USD");
    }
}
