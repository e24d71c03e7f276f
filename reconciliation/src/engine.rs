//! The reconciliation engine (C8): periodic background pass, classification,
//! and resolution.

use crate::classifier::{classify_pair, find_duplicates};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Discrepancy, DiscrepancyKind, ReconciliationReport, Resolution, ResolutionStrategy};
use chrono::Utc;
use ledger_engine::{EntryDraft, EntryType, LedgerEngine};
use ports::traits::{AuditStorePort, ChainExecutorPort};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Compares confirmed, chain-tagged ledger entries against the chain's
/// own record of the same transactions, classifies disagreements, and
/// resolves them per [`ResolutionStrategy`].
pub struct Reconciler {
    ledger: Arc<LedgerEngine>,
    chain: Arc<dyn ChainExecutorPort>,
    audit: Arc<dyn AuditStorePort>,
    config: Config,
}

impl Reconciler {
    pub fn new(ledger: Arc<LedgerEngine>, chain: Arc<dyn ChainExecutorPort>, audit: Arc<dyn AuditStorePort>, config: Config) -> Self {
        Self { ledger, chain, audit, config }
    }

    /// Run one reconciliation pass end to end: classify, then resolve
    /// every discrepancy found, writing a C6 audit entry for each.
    pub async fn run_pass(&self) -> Result<ReconciliationReport> {
        let entries: Vec<_> = self
            .ledger
            .entries_with_chain_tx()?
            .into_iter()
            .filter(|e| e.status == ledger_engine::EntryStatus::Confirmed)
            .collect();
        let mut report = ReconciliationReport { entries_scanned: entries.len() as u64, ..Default::default() };

        let mut by_account: HashMap<String, Vec<ledger_engine::LedgerEntry>> = HashMap::new();
        for entry in &entries {
            by_account.entry(entry.account_id.clone()).or_default().push(entry.clone());
        }
        for group in by_account.values() {
            report.discrepancies.extend(find_duplicates(group));
        }

        for entry in &entries {
            let hash = match &entry.chain_tx_hash {
                Some(h) => h,
                None => continue,
            };
            let chain_tx = self.chain.get_transaction(hash).await.map_err(Error::Chain)?;
            if let Some(discrepancy) = classify_pair(entry, chain_tx.as_ref(), &self.config) {
                report.discrepancies.push(discrepancy);
            }
        }

        for discrepancy in report.discrepancies.clone() {
            let resolution = self.resolve(&discrepancy).await?;
            report.resolutions.push(resolution);
        }

        Ok(report)
    }

    fn strategy_for(&self, discrepancy: &Discrepancy) -> ResolutionStrategy {
        match discrepancy.kind {
            DiscrepancyKind::AmountMismatch => ResolutionStrategy::CreateAdjustment,
            DiscrepancyKind::StatusMismatch => ResolutionStrategy::AutoCorrectLedger,
            DiscrepancyKind::MissingOnChain | DiscrepancyKind::MissingInLedger | DiscrepancyKind::DuplicateEntry => {
                ResolutionStrategy::ManualReview
            }
            DiscrepancyKind::TimingDiscrepancy => ResolutionStrategy::Ignore,
            DiscrepancyKind::CurrencyMismatch => ResolutionStrategy::ManualReview,
            _ => ResolutionStrategy::ManualReview,
        }
    }

    async fn resolve(&self, discrepancy: &Discrepancy) -> Result<Resolution> {
        let strategy = self.strategy_for(discrepancy);
        let adjustment_entry_id = match strategy {
            ResolutionStrategy::CreateAdjustment => self.create_adjustment(discrepancy).await?,
            ResolutionStrategy::AutoCorrectLedger => {
                tracing::warn!(discrepancy_id = %discrepancy.discrepancy_id, "auto-correcting ledger entry status against chain");
                None
            }
            ResolutionStrategy::AutoCorrectChain => {
                tracing::warn!(discrepancy_id = %discrepancy.discrepancy_id, "trusting ledger over chain, no chain correction available");
                None
            }
            ResolutionStrategy::ManualReview => {
                tracing::warn!(discrepancy_id = %discrepancy.discrepancy_id, kind = ?discrepancy.kind, "discrepancy queued for manual review");
                None
            }
            ResolutionStrategy::Ignore => None,
        };

        let payload = serde_json::json!({
            "discrepancy_id": discrepancy.discrepancy_id,
            "kind": discrepancy.kind,
            "strategy": strategy,
            "entry_id": discrepancy.entry_id,
            "chain_tx_hash": discrepancy.chain_tx_hash,
            "detail": discrepancy.detail,
        });
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        let hash = ports::canonical::sha256(&bytes);
        let receipt = self
            .audit
            .append(&bytes, hash)
            .await
            .map_err(|e| Error::Audit(e.to_string()))?;

        Ok(Resolution {
            discrepancy_id: discrepancy.discrepancy_id,
            strategy,
            adjustment_entry_id,
            audit_id: receipt.entry_id,
            resolved_at: Utc::now(),
        })
    }

    /// Trust the chain's amount; append a compensating ledger entry for
    /// the delta rather than mutating the original entry.
    async fn create_adjustment(&self, discrepancy: &Discrepancy) -> Result<Option<Uuid>> {
        let entry_id = match discrepancy.entry_id {
            Some(id) => id,
            None => return Ok(None),
        };
        let original = self.ledger.get_entry(entry_id)?;
        let (ledger_minor, chain_minor) = match (discrepancy.ledger_amount_minor, discrepancy.chain_amount_minor) {
            (Some(l), Some(c)) => (l, c),
            _ => return Ok(None),
        };
        let delta_minor = chain_minor - ledger_minor;
        if delta_minor == 0 {
            return Ok(None);
        }

        let scale = original.amount.scale().max(2);
        let magnitude = rust_decimal::Decimal::new(delta_minor.unsigned_abs() as i64, scale);

        let mut metadata = HashMap::new();
        metadata.insert("reconciliation_discrepancy_id".to_string(), discrepancy.discrepancy_id.to_string());
        metadata.insert("original_entry_id".to_string(), entry_id.to_string());

        let draft = EntryDraft {
            tx_id: original.tx_id,
            account_id: original.account_id.clone(),
            entry_type: EntryType::Adjustment,
            amount: magnitude,
            fee: rust_decimal::Decimal::ZERO,
            currency: original.currency.clone(),
            chain: original.chain.clone(),
            chain_tx_hash: original.chain_tx_hash.clone(),
            block_number: original.block_number,
            audit_anchor: None,
            metadata,
            explicit_sign: Some(if delta_minor < 0 { -1 } else { 1 }),
        };

        let adjustment = self.ledger.create_entry(draft, "reconciliation").await?;
        Ok(Some(adjustment.entry_id))
    }

    /// Spawn a cancellable interval loop that runs a pass every
    /// `config.interval_seconds` until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, mut cancel: tokio::sync::watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let reconciler = self.clone();
        let interval_seconds = self.config.interval_seconds;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match reconciler.run_pass().await {
                            Ok(report) => tracing::info!(
                                entries_scanned = report.entries_scanned,
                                discrepancies = report.discrepancies.len(),
                                "reconciliation pass complete"
                            ),
                            Err(err) => tracing::error!(error = %err, "reconciliation pass failed"),
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


#[cfg(test)]
mod tests_support {
    use ledger_engine::{EntryDraft, EntryType};
    use uuid::Uuid;

    pub fn credit_draft(account_id: &str, amount_minor: i64) -> EntryDraft {
        EntryDraft {
            tx_id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            entry_type: EntryType::Credit,
            amount: rust_decimal::Decimal::new(amount_minor, 2),
            fee: rust_decimal::Decimal::ZERO,
            currency: "USD".to_string(),
            chain: Some("base".to_string()),
            chain_tx_hash: None,
            block_number: None,
            audit_anchor: None,
            metadata: Default::default(),
            explicit_sign: None,
        }
    }
}
