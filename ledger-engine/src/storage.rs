//! RocksDB-backed storage for ledger entries and snapshots
//!
//! # Column families
//!
//! - `entries` - append-only entry log, keyed by `entry_id`
//! - `account_index` - `account|currency|sequence(be)` → `entry_id`, for ordered forward scans
//! - `snapshots` - `account|currency|sequence(be)` → snapshot, for at-or-before lookups
//! - `counters` - per-(account, currency) entry counters

use crate::error::{Error, Result};
use crate::types::{BalanceSnapshot, LedgerEntry};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const CF_ENTRIES: &str = "entries";
const CF_ACCOUNT_INDEX: &str = "account_index";
const CF_SNAPSHOTS: &str = "snapshots";
const CF_COUNTERS: &str = "counters";

/// Storage wrapper over RocksDB, one instance per ledger engine process.
pub struct Storage {
    db: Arc<DB>,
    sequence: AtomicU64,
}

impl Storage {
    /// Open (or create) the database at `config.data_dir`.
    pub fn open(config: &crate::config::Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size((config.rocksdb.write_buffer_size_mb * 1024 * 1024) as usize);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );
        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_opts_compressed()),
            ColumnFamilyDescriptor::new(CF_ACCOUNT_INDEX, Self::cf_opts_indexed()),
            ColumnFamilyDescriptor::new(CF_SNAPSHOTS, Self::cf_opts_compressed()),
            ColumnFamilyDescriptor::new(CF_COUNTERS, Self::cf_opts_indexed()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;
        let sequence = Self::max_sequence(&db)?;

        tracing::info!(data_dir = ?config.data_dir, "ledger storage opened");
        Ok(Self {
            db: Arc::new(db),
            sequence: AtomicU64::new(sequence),
        })
    }

    fn cf_opts_compressed() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_opts_indexed() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    /// Resume point for the monotonic sequence counter. `account_index`
    /// keys end in the big-endian `sequence` that produced them, so the
    /// highest 8-byte suffix across the whole column family is the
    /// highest sequence ever issued — unlike `entries` (keyed by random
    /// `entry_id` UUID bytes), whose key order has no relation to
    /// `sequence` at all.
    fn max_sequence(db: &DB) -> Result<u64> {
        let cf = db
            .cf_handle(CF_ACCOUNT_INDEX)
            .ok_or_else(|| Error::Storage("missing account_index cf".to_string()))?;
        let mut max_seq = 0u64;
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            if key.len() < 8 {
                continue;
            }
            let seq_bytes: [u8; 8] = key[key.len() - 8..].try_into().unwrap();
            let sequence = u64::from_be_bytes(seq_bytes);
            if sequence > max_seq {
                max_seq = sequence;
            }
        }
        Ok(max_seq)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {name} not found")))
    }

    /// Allocate the next monotonic insertion sequence.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn account_index_key(account_id: &str, currency: &str, sequence: u64) -> Vec<u8> {
        let mut key = account_id.as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(currency.as_bytes());
        key.push(0);
        key.extend_from_slice(&sequence.to_be_bytes());
        key
    }

    fn account_index_prefix(account_id: &str, currency: &str) -> Vec<u8> {
        let mut key = account_id.as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(currency.as_bytes());
        key.push(0);
        key
    }

    /// Append one entry, updating its account index atomically.
    pub fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_entries = self.cf(CF_ENTRIES)?;
        batch.put_cf(cf_entries, entry.entry_id.as_bytes(), bincode::serialize(entry)?);

        let cf_index = self.cf(CF_ACCOUNT_INDEX)?;
        let index_key = Self::account_index_key(&entry.account_id, &entry.currency, entry.sequence);
        batch.put_cf(cf_index, index_key, entry.entry_id.as_bytes());

        self.db.write(batch)?;
        Ok(())
    }

    /// Fetch an entry by id.
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        let cf = self.cf(CF_ENTRIES)?;
        let value = self
            .db
            .get_cf(cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Overwrite an existing entry (used only to flip `status` on reversal,
    /// never to alter any other field — Invariant B).
    pub fn put_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let cf = self.cf(CF_ENTRIES)?;
        self.db.put_cf(cf, entry.entry_id.as_bytes(), bincode::serialize(entry)?)?;
        Ok(())
    }

    /// Entries for `(account_id, currency)` with `sequence` in `(after, at_or_before]`,
    /// in ascending sequence order.
    pub fn scan_account(
        &self,
        account_id: &str,
        currency: &str,
        after_sequence: u64,
        at_or_before_sequence: u64,
    ) -> Result<Vec<LedgerEntry>> {
        let cf_index = self.cf(CF_ACCOUNT_INDEX)?;
        let prefix = Self::account_index_prefix(account_id, currency);
        let iter = self.db.prefix_iterator_cf(cf_index, &prefix);

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let seq_bytes: [u8; 8] = key[key.len() - 8..].try_into().unwrap();
            let sequence = u64::from_be_bytes(seq_bytes);
            if sequence <= after_sequence {
                continue;
            }
            if sequence > at_or_before_sequence {
                break;
            }
            let entry_id = Uuid::from_slice(&value).map_err(|e| Error::Storage(e.to_string()))?;
            entries.push(self.get_entry(entry_id)?);
        }
        Ok(entries)
    }

    /// Newest snapshot for `(account_id, currency)` with `last_sequence <= at`.
    pub fn latest_snapshot_at_or_before(
        &self,
        account_id: &str,
        currency: &str,
        at_sequence: u64,
    ) -> Result<Option<BalanceSnapshot>> {
        let cf = self.cf(CF_SNAPSHOTS)?;
        let prefix = Self::account_index_prefix(account_id, currency);
        let iter = self.db.prefix_iterator_cf(cf, &prefix);

        let mut best: Option<BalanceSnapshot> = None;
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let snapshot: BalanceSnapshot = bincode::deserialize(&value)?;
            if snapshot.last_sequence > at_sequence {
                continue;
            }
            best = Some(snapshot);
        }
        Ok(best)
    }

    /// Persist a new snapshot.
    pub fn put_snapshot(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        let cf = self.cf(CF_SNAPSHOTS)?;
        let key = Self::account_index_key(&snapshot.account_id, &snapshot.currency, snapshot.last_sequence);
        self.db.put_cf(cf, key, bincode::serialize(snapshot)?)?;
        Ok(())
    }

    /// Increment and return the per-(account, currency) entry counter.
    pub fn increment_counter(&self, account_id: &str, currency: &str) -> Result<u64> {
        let cf = self.cf(CF_COUNTERS)?;
        let key = format!("{account_id}|{currency}");
        let current = self
            .db
            .get_cf(cf, key.as_bytes())?
            .map(|bytes| u64::from_be_bytes(bytes.as_slice().try_into().unwrap_or_default()))
            .unwrap_or(0);
        let next = current + 1;
        self.db.put_cf(cf, key.as_bytes(), next.to_be_bytes())?;
        Ok(next)
    }

    /// Every entry carrying a `chain_tx_hash`, regardless of account —
    /// the reconciler's input set. A full scan of `entries`; acceptable
    /// for the periodic background pass this feeds, not the write path.
    pub fn entries_with_chain_tx(&self) -> Result<Vec<LedgerEntry>> {
        let cf = self.cf(CF_ENTRIES)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let entry: LedgerEntry = bincode::deserialize(&value)?;
            if entry.chain_tx_hash.is_some() {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// Latest entry for `(account_id, currency)`, if any — used to seed
    /// `running_balance` for the next write.
    pub fn latest_entry(&self, account_id: &str, currency: &str) -> Result<Option<LedgerEntry>> {
        let cf_index = self.cf(CF_ACCOUNT_INDEX)?;
        let prefix = Self::account_index_prefix(account_id, currency);

        let mut upper = prefix.clone();
        upper.push(0xff);
        let iter = self.db.iterator_cf(
            cf_index,
            IteratorMode::From(&upper, rocksdb::Direction::Reverse),
        );

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                continue;
            }
            let entry_id = Uuid::from_slice(&value).map_err(|e| Error::Storage(e.to_string()))?;
            return Ok(Some(self.get_entry(entry_id)?));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{EntryStatus, EntryType};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        (config, dir)
    }

    fn entry(account_id: &str, sequence: u64, balance: i64) -> LedgerEntry {
        LedgerEntry {
            entry_id: Uuid::new_v4(),
            tx_id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            entry_type: EntryType::Credit,
            amount: Decimal::new(balance, 2),
            fee: Decimal::ZERO,
            running_balance: Decimal::new(balance, 2),
            currency: "USD".to_string(),
            chain: None,
            chain_tx_hash: None,
            block_number: None,
            audit_anchor: None,
            status: EntryStatus::Confirmed,
            created_at: Utc::now(),
            confirmed_at: Some(Utc::now()),
            metadata: HashMap::new(),
            sequence,
        }
    }

    #[test]
    fn appends_and_reads_back_entry() {
        let (config, _dir) = test_config();
        let storage = Storage::open(&config).unwrap();
        let e = entry("sub_agent-1", 1, 1000);
        storage.append_entry(&e).unwrap();
        let fetched = storage.get_entry(e.entry_id).unwrap();
        assert_eq!(fetched.entry_id, e.entry_id);
    }

    #[test]
    fn scans_account_in_sequence_order() {
        let (config, _dir) = test_config();
        let storage = Storage::open(&config).unwrap();
        for seq in 1..=5 {
            storage.append_entry(&entry("sub_agent-1", seq, 100 * seq as i64)).unwrap();
        }
        let scanned = storage.scan_account("sub_agent-1", "USD", 0, 5).unwrap();
        assert_eq!(scanned.len(), 5);
        assert_eq!(scanned.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn latest_entry_returns_highest_sequence() {
        let (config, _dir) = test_config();
        let storage = Storage::open(&config).unwrap();
        storage.append_entry(&entry("sub_agent-1", 1, 100)).unwrap();
        storage.append_entry(&entry("sub_agent-1", 2, 200)).unwrap();
        let latest = storage.latest_entry("sub_agent-1", "USD").unwrap().unwrap();
        assert_eq!(latest.sequence, 2);
    }
}
