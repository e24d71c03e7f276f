//! RocksDB-backed, hash-chained, append-only audit store
//!
//! # Column families
//!
//! - `entries` - keyed by `entry_id`
//! - `chain_index` - `chain_position(be)` → `entry_id`, for ordered replay

use crate::error::{Error, Result};
use crate::merkle::MerkleTree;
use crate::types::{AppendReceipt, AuditEntry, ChainVerification};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const CF_ENTRIES: &str = "entries";
const CF_CHAIN_INDEX: &str = "chain_index";

fn chain_link(record_hash: &[u8; 32], prev_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record_hash);
    hasher.update(prev_hash);
    hasher.finalize().into()
}

/// Durable, hash-chained audit log with an in-memory Merkle index for
/// inclusion proofs. One instance per process.
pub struct Store {
    db: Arc<DB>,
    next_position: AtomicU64,
    tree: parking_lot::Mutex<MerkleTree>,
    last_hash: parking_lot::Mutex<[u8; 32]>,
}

impl Store {
    pub fn open(config: &crate::config::Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Options::default()),
            ColumnFamilyDescriptor::new(CF_CHAIN_INDEX, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;
        let (next_position, last_hash, tree) = Self::rebuild_index(&db)?;

        tracing::info!(data_dir = ?config.data_dir, entries = next_position, "audit store opened");
        Ok(Self {
            db: Arc::new(db),
            next_position: AtomicU64::new(next_position),
            tree: parking_lot::Mutex::new(tree),
            last_hash: parking_lot::Mutex::new(last_hash),
        })
    }

    fn rebuild_index(db: &DB) -> Result<(u64, [u8; 32], MerkleTree)> {
        let cf = db
            .cf_handle(CF_CHAIN_INDEX)
            .ok_or_else(|| Error::Storage("missing chain_index cf".to_string()))?;
        let entries_cf = db
            .cf_handle(CF_ENTRIES)
            .ok_or_else(|| Error::Storage("missing entries cf".to_string()))?;

        let mut leaves = Vec::new();
        let mut last_hash = [0u8; 32];
        let mut count = 0u64;

        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (_, entry_id_bytes) = item?;
            let entry_id = Uuid::from_slice(&entry_id_bytes).map_err(|e| Error::Storage(e.to_string()))?;
            let raw = db
                .get_cf(entries_cf, entry_id.as_bytes())?
                .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;
            let entry: AuditEntry = bincode::deserialize(&raw)?;
            leaves.push(entry.entry_hash);
            last_hash = entry.entry_hash;
            count += 1;
        }

        Ok((count, last_hash, MerkleTree::from_leaves(leaves)))
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {name} not found")))
    }

    /// Append one record, chained to whatever was appended before it.
    /// `record_hash` identifies the record's own content; callers that
    /// already canonicalized and hashed their payload (e.g. a port
    /// adapter) pass that hash directly.
    pub fn append(&self, event_type: &str, payload: Vec<u8>, record_hash: [u8; 32]) -> Result<AppendReceipt> {
        let chain_position = self.next_position.fetch_add(1, Ordering::SeqCst);
        let prev_hash = *self.last_hash.lock();
        let entry_hash = chain_link(&record_hash, &prev_hash);

        let entry = AuditEntry {
            entry_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            payload,
            chain_position,
            record_hash,
            prev_hash,
            entry_hash,
            recorded_at: chrono::Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_ENTRIES)?, entry.entry_id.as_bytes(), bincode::serialize(&entry)?);
        batch.put_cf(self.cf(CF_CHAIN_INDEX)?, chain_position.to_be_bytes(), entry.entry_id.as_bytes());
        self.db.write(batch)?;

        *self.last_hash.lock() = entry_hash;

        let proof = {
            let mut tree = self.tree.lock();
            tree.append(entry_hash);
            tree.generate_proof(chain_position as usize)
                .expect("just-appended leaf must have a proof")
        };

        Ok(AppendReceipt { entry_id: entry.entry_id, chain_position, entry_hash, proof })
    }

    pub fn get(&self, entry_id: Uuid) -> Result<AuditEntry> {
        let raw = self
            .db
            .get_cf(self.cf(CF_ENTRIES)?, entry_id.as_bytes())?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;
        Ok(bincode::deserialize(&raw)?)
    }

    pub fn get_by_position(&self, chain_position: u64) -> Result<Option<AuditEntry>> {
        let cf = self.cf(CF_CHAIN_INDEX)?;
        let Some(entry_id_bytes) = self.db.get_cf(cf, chain_position.to_be_bytes())? else {
            return Ok(None);
        };
        let entry_id = Uuid::from_slice(&entry_id_bytes).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(Some(self.get(entry_id)?))
    }

    pub fn current_root(&self) -> [u8; 32] {
        self.tree.lock().root()
    }

    pub fn len(&self) -> u64 {
        self.next_position.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk every entry in chain order, recomputing hashes, and stop at
    /// the first mismatch. Re-derives `record_hash` from the stored
    /// `payload` before trusting `entry_hash` — otherwise a tampered
    /// payload whose `record_hash`/`entry_hash` were left untouched
    /// would recompute the same chain link and pass unnoticed.
    pub fn verify_chain(&self) -> Result<ChainVerification> {
        let mut expected_prev = [0u8; 32];
        let mut position = 0u64;

        loop {
            let Some(entry) = self.get_by_position(position)? else {
                break;
            };
            let recomputed_record_hash = ports::canonical::sha256(&entry.payload);
            let recomputed_entry_hash = chain_link(&recomputed_record_hash, &expected_prev);
            if entry.record_hash != recomputed_record_hash
                || entry.prev_hash != expected_prev
                || entry.entry_hash != recomputed_entry_hash
            {
                return Ok(ChainVerification::Broken {
                    at_entry_id: entry.entry_id,
                    chain_position: entry.chain_position,
                });
            }
            expected_prev = entry.entry_hash;
            position += 1;
        }

        Ok(ChainVerification::Intact)
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

    fn hash_payload(payload: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.finalize().into()
    }

    #[test]
    fn appended_entries_are_chained() {
        let (store, _dir) = test_store();
        let p1 = b"{\"n\":1}".to_vec();
        let p2 = b"{\"n\":2}".to_vec();
        let r1 = store.append("ledger.entry.created", p1.clone(), hash_payload(&p1)).unwrap();
        let r2 = store.append("ledger.entry.created", p2.clone(), hash_payload(&p2)).unwrap();
        assert_eq!(r1.chain_position, 0);
        assert_eq!(r2.chain_position, 1);

        let e2 = store.get(r2.entry_id).unwrap();
        assert_eq!(e2.prev_hash, r1.entry_hash);
    }

    #[test]
    fn verify_chain_reports_intact() {
        let (store, _dir) = test_store();
        for i in 0..5 {
            let p = format!("{{\"i\":{i}}}").into_bytes();
            store.append("evt", p.clone(), hash_payload(&p)).unwrap();
        }
        assert_eq!(store.verify_chain().unwrap(), ChainVerification::Intact);
    }

    #[test]
    fn verify_chain_detects_tamper() {
        let (store, _dir) = test_store();
        let p0 = b"{\"i\":0}".to_vec();
        let r1 = store.append("evt", p0.clone(), hash_payload(&p0)).unwrap();
        let p1 = b"{\"i\":1}".to_vec();
        store.append("evt", p1.clone(), hash_payload(&p1)).unwrap();

        let mut tampered = store.get(r1.entry_id).unwrap();
        tampered.payload = b"{\"i\":999}".to_vec();
        let cf = store.cf(CF_ENTRIES).unwrap();
        store
            .db
            .put_cf(cf, tampered.entry_id.as_bytes(), bincode::serialize(&tampered).unwrap())
            .unwrap();

        match store.verify_chain().unwrap() {
            ChainVerification::Broken { at_entry_id, .. } => assert_eq!(at_entry_id, r1.entry_id),
            ChainVerification::Intact => panic!("expected tamper to be detected"),
        }
    }

    #[test]
    fn receipts_carry_verifiable_inclusion_proofs() {
        let (store, _dir) = test_store();
        let p0 = b"{\"i\":0}".to_vec();
        store.append("evt", p0.clone(), hash_payload(&p0)).unwrap();
        let p1 = b"{\"i\":1}".to_vec();
        let r = store.append("evt", p1.clone(), hash_payload(&p1)).unwrap();
        assert!(r.proof.verify());
        assert_eq!(r.proof.root_hash, store.current_root());
    }
}
