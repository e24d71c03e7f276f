//! The chain manager (C9): settlement-mode dispatch and batching

use crate::config::Config;
use crate::types::{Batch, SettlementMode, SettlementOutcome, SettlementRequest};
use chrono::Utc;
use dashmap::DashMap;
use ports::traits::ChainExecutorPort;
use retry_caller::RetryableCaller;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// Dispatches settlements to a chain per the selected [`SettlementMode`],
/// accumulating `batched` requests per chain until a close trigger fires.
pub struct ChainManager {
    chain: Arc<dyn ChainExecutorPort>,
    caller: RetryableCaller,
    config: Config,
    batches: Mutex<HashMap<String, Batch>>,
    outcomes: DashMap<Uuid, SettlementOutcome>,
}

impl ChainManager {
    pub fn new(chain: Arc<dyn ChainExecutorPort>, caller: RetryableCaller, config: Config) -> Self {
        Self { chain, caller, config, batches: Mutex::new(HashMap::new()), outcomes: DashMap::new() }
    }

    /// Dispatch one settlement under the request's mode override, or the
    /// manager's default mode if none is given.
    pub async fn dispatch(&self, request: SettlementRequest) -> SettlementOutcome {
        let mode = request.mode_override.unwrap_or(self.config.default_mode);
        match mode {
            SettlementMode::InternalOnly => {
                let outcome = SettlementOutcome::confirmed(request.settlement_id, None, None);
                self.outcomes.insert(request.settlement_id, outcome.clone());
                outcome
            }
            SettlementMode::PerTx => self.dispatch_per_tx(request).await,
            SettlementMode::Batched => self.enqueue_batch(request).await,
        }
    }

    async fn dispatch_per_tx(&self, request: SettlementRequest) -> SettlementOutcome {
        let provider = format!("chain:{}", request.payment.chain);
        let outcome = match self.caller.call(&provider, || self.chain.dispatch(&request.payment)).await {
            Ok(receipt) => SettlementOutcome::confirmed(request.settlement_id, Some(receipt.tx_hash), receipt.block_number),
            Err(err) => {
                tracing::warn!(settlement_id = %request.settlement_id, error = %err, "per-tx dispatch failed");
                SettlementOutcome::failed(request.settlement_id, err.to_string())
            }
        };
        self.outcomes.insert(request.settlement_id, outcome.clone());
        outcome
    }

    async fn enqueue_batch(&self, request: SettlementRequest) -> SettlementOutcome {
        let chain = request.payment.chain.clone();
        let settlement_id = request.settlement_id;

        let closed = {
            let mut batches = self.batches.lock().await;
            let batch = batches.entry(chain.clone()).or_insert_with(|| Batch::new(chain.clone()));
            batch.requests.push(request);
            if batch.requests.len() >= self.config.max_batch_size {
                batches.remove(&chain)
            } else {
                None
            }
        };

        let outcome = closed
            .as_ref()
            .map(|b| SettlementOutcome::submitted(settlement_id, b.batch_id))
            .unwrap_or_else(|| {
                // Still accumulating; report the open batch's id by peeking again.
                SettlementOutcome::submitted(settlement_id, Uuid::nil())
            });
        self.outcomes.insert(settlement_id, outcome.clone());

        if let Some(batch) = closed {
            self.submit_batch(batch).await;
        }

        self.outcomes.get(&settlement_id).map(|r| r.clone()).unwrap_or(outcome)
    }

    /// Manually close and submit whatever is accumulated for `chain`,
    /// regardless of size/interval triggers. No-op if nothing is open.
    pub async fn flush(&self, chain: &str) -> Vec<SettlementOutcome> {
        let batch = {
            let mut batches = self.batches.lock().await;
            batches.remove(chain)
        };
        match batch {
            Some(batch) => self.submit_batch(batch).await,
            None => Vec::new(),
        }
    }

    /// Check every open batch's elapsed time against `batch_interval_seconds`
    /// and flush any that also meet `min_batch_size`. Intended to be driven
    /// by [`ChainManager::spawn_ticker`].
    pub async fn check_batch_triggers(&self) {
        let now = Utc::now();
        let ready: Vec<String> = {
            let batches = self.batches.lock().await;
            batches
                .values()
                .filter(|b| {
                    let elapsed = (now - b.opened_at).num_seconds().max(0) as u64;
                    b.requests.len() >= self.config.min_batch_size && elapsed >= self.config.batch_interval_seconds
                })
                .map(|b| b.chain.clone())
                .collect()
        };
        for chain in ready {
            self.flush(&chain).await;
        }
    }

    /// Spawn a cancellable loop that periodically checks batch triggers.
    pub fn spawn_ticker(self: &Arc<Self>, tick_seconds: u64, mut cancel: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(tick_seconds));
            loop {
                tokio::select! {
                    _ = ticker.tick() => manager.check_batch_triggers().await,
                    _ = cancel.changed() => {
                        if *cancel.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Retries the whole batch, up to `max_retry_attempts`, before marking
    /// every settlement in it `failed` — batches are never silently split.
    async fn submit_batch(&self, batch: Batch) -> Vec<SettlementOutcome> {
        let provider = format!("chain-batch:{}", batch.chain);

        for attempt in 0..=self.config.max_retry_attempts {
            let mut receipts = Vec::with_capacity(batch.requests.len());
            let mut failure: Option<String> = None;

            for request in &batch.requests {
                match self.caller.call(&provider, || self.chain.dispatch(&request.payment)).await {
                    Ok(receipt) => receipts.push(receipt),
                    Err(err) => {
                        failure = Some(err.to_string());
                        break;
                    }
                }
            }

            if let Some(reason) = failure {
                if attempt < self.config.max_retry_attempts {
                    tracing::warn!(batch_id = %batch.batch_id, attempt, %reason, "batch dispatch failed, retrying whole batch");
                    continue;
                }
                tracing::error!(batch_id = %batch.batch_id, %reason, "batch exhausted retries, marking all settlements failed");
                return batch
                    .requests
                    .iter()
                    .map(|req| {
                        let outcome = SettlementOutcome::failed(req.settlement_id, reason.clone());
                        self.outcomes.insert(req.settlement_id, outcome.clone());
                        outcome
                    })
                    .collect();
            }

            return batch
                .requests
                .iter()
                .zip(receipts)
                .map(|(req, receipt)| {
                    let outcome = SettlementOutcome::confirmed(req.settlement_id, Some(receipt.tx_hash), receipt.block_number);
                    self.outcomes.insert(req.settlement_id, outcome.clone());
                    outcome
                })
                .collect();
        }
        unreachable!("0..=max_retry_attempts always yields at least one iteration")
    }

    /// Look up a previously recorded outcome (for a batched settlement
    /// whose batch has since closed).
    pub fn outcome(&self, settlement_id: Uuid) -> Option<SettlementOutcome> {
        self.outcomes.get(&settlement_id).map(|r| r.clone())
    }
}
