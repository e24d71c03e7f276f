//! Public audit trail API (C6)

use crate::error::Result as TrailResult;
use crate::store::Store;
use crate::types::{AppendReceipt, ChainVerification};
use async_trait::async_trait;
use ports::error::PortError;
use ports::traits::{AnchorPort, AppendReceipt as PortAppendReceipt, AuditStorePort, PortResult};
use std::sync::Arc;

/// Hash-chained, append-only audit trail. Native callers (other crates
/// in this workspace) use [`AuditTrail::record`] directly; external
/// callers reach it only through the opaque [`AuditStorePort`].
pub struct AuditTrail {
    store: Arc<Store>,
}

impl AuditTrail {
    pub fn open(config: &crate::config::Config) -> TrailResult<Self> {
        Ok(Self { store: Arc::new(Store::open(config)?) })
    }

    /// Record a typed event. `payload` is canonicalized before hashing
    /// so semantically-identical JSON always produces the same record
    /// hash. The canonical bytes, not the original JSON, are what get
    /// stored as the entry's payload: `record_hash` is `sha256` of
    /// exactly those bytes, so `Store::verify_chain` can re-derive it
    /// from the stored entry alone, with nothing held only in memory.
    pub fn record(&self, event_type: &str, payload: serde_json::Value) -> TrailResult<AppendReceipt> {
        let canonical = ports::canonical::canonical_bytes(&serde_json::json!({
            "event_type": event_type,
            "payload": &payload,
        }));
        let record_hash = ports::canonical::sha256(&canonical);
        self.store.append(event_type, canonical, record_hash)
    }

    pub fn verify_chain(&self) -> TrailResult<ChainVerification> {
        self.store.verify_chain()
    }

    pub fn current_root(&self) -> [u8; 32] {
        self.store.current_root()
    }

    pub fn len(&self) -> u64 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Spawn the periodic root-anchoring task. The task exits when
    /// `cancel` fires or the handle is dropped.
    pub fn spawn_anchor_task(
        self: &Arc<Self>,
        anchor: Arc<dyn AnchorPort>,
        interval_seconds: u64,
        mut cancel: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let trail = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let root = trail.current_root();
                        match anchor.anchor(root).await {
                            Ok(receipt) => tracing::info!(tx_hash = %receipt.tx_hash, chain = %receipt.chain, "audit root anchored"),
                            Err(err) => tracing::warn!(error = %err, "audit root anchoring failed"),
                        }
                    }
                    _ = cancel.changed() => {
                        if *cancel.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl AuditStorePort for AuditTrail {
    async fn append(&self, entry_json: &[u8], entry_hash: [u8; 32]) -> PortResult<PortAppendReceipt> {
        let receipt = self
            .store
            .append("external", entry_json.to_vec(), entry_hash)
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        Ok(PortAppendReceipt {
            entry_id: receipt.entry_id.to_string(),
            entry_hash: receipt.entry_hash,
            sequence: receipt.chain_position,
        })
    }

    async fn get(&self, id: &str) -> PortResult<Option<Vec<u8>>> {
        let entry_id = uuid::Uuid::parse_str(id).map_err(|e| PortError::Encoding(e.to_string()))?;
        match self.store.get(entry_id) {
            Ok(entry) => Ok(Some(entry.payload)),
            Err(crate::error::Error::EntryNotFound(_)) => Ok(None),
            Err(e) => Err(PortError::Unavailable(e.to_string())),
        }
    }

    async fn verify_chain(&self) -> PortResult<(bool, Option<String>)> {
        match self.store.verify_chain().map_err(|e| PortError::Unavailable(e.to_string()))? {
            ChainVerification::Intact => Ok((true, None)),
            ChainVerification::Broken { at_entry_id, .. } => Ok((false, Some(at_entry_id.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    fn test_trail() -> (AuditTrail, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = crate::config::Config::default();
        config.data_dir = dir.path().to_path_buf();
        (AuditTrail::open(&config).unwrap(), dir)
    }

    #[test]
    fn record_is_deterministically_hashed() {
        let (trail, _dir) = test_trail();
        let r1 = trail.record("compliance.decision", serde_json::json!({"tx": "abc", "allow": true})).unwrap();
        assert_eq!(r1.chain_position, 0);
        assert!(!trail.is_empty());
    }

    #[tokio::test]
    async fn port_impl_round_trips_opaque_payload() {
        let (trail, _dir) = test_trail();
        let payload = b"opaque ledger entry bytes".to_vec();
        let hash = {
            let mut hasher = Sha256::new();
            hasher.update(&payload);
            hasher.finalize().into()
        };
        let receipt = AuditStorePort::append(&trail, &payload, hash).await.unwrap();
        let fetched = AuditStorePort::get(&trail, &receipt.entry_id).await.unwrap();
        assert_eq!(fetched, Some(payload));
    }

    #[tokio::test]
    async fn port_verify_chain_reports_intact() {
        let (trail, _dir) = test_trail();
        trail.record("evt", serde_json::json!({"i": 1})).unwrap();
        let (intact, broken_at) = AuditStorePort::verify_chain(&trail).await.unwrap();
        assert!(intact);
        assert!(broken_at.is_none());
    }
}
