//! The fiat orchestrator (C10): named multi-step flows over the
//! sub-ledger and the treasury/ramp ports.

use crate::error::{Error, Result};
use crate::flow::CompensationStack;
use crate::types::FlowOutcome;
use dashmap::DashMap;
use ports::money::{Currency, Money};
use ports::traits::{RampPort, RampStatus, TreasuryPort};
use rust_decimal::Decimal;
use std::sync::Arc;
use sub_ledger::SubLedger;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionKind {
    CardFunding,
    ToFiat,
}

struct PendingRamp {
    agent_id: String,
    amount: Decimal,
    currency: Currency,
    kind: SessionKind,
}

/// Drives named fiat flows (`deposit`, `withdraw_to_bank`,
/// `fund_card_from_crypto`, `crypto_to_fiat`) over a sub-ledger and the
/// treasury/ramp ports, compensating on partial failure.
pub struct FiatOrchestrator {
    sub_ledger: Arc<SubLedger>,
    treasury: Arc<dyn TreasuryPort>,
    ramp: Arc<dyn RampPort>,
    sessions: DashMap<String, PendingRamp>,
}

impl FiatOrchestrator {
    pub fn new(sub_ledger: Arc<SubLedger>, treasury: Arc<dyn TreasuryPort>, ramp: Arc<dyn RampPort>) -> Self {
        Self { sub_ledger, treasury, ramp, sessions: DashMap::new() }
    }

    /// Credit `agent_id`'s available balance by `amount`; single-step,
    /// nothing to compensate.
    pub async fn deposit(&self, agent_id: &str, amount: Decimal, reference: &str) -> Result<FlowOutcome> {
        let record = self.sub_ledger.deposit(agent_id, amount, Some(reference), Some("fiat deposit")).await?;
        Ok(FlowOutcome::completed(vec![record.record_id], Some(reference.to_string())))
    }

    /// `spec.md §4.10`'s worked example: check available, debit,
    /// create the outbound transfer, compensate on failure.
    pub async fn withdraw_to_bank(&self, agent_id: &str, amount: Decimal, currency: Currency, destination: &str) -> Result<FlowOutcome> {
        let balances = self.sub_ledger.balances(agent_id)?;
        if balances.available < amount {
            return Err(Error::InsufficientAvailable {
                available: balances.available.to_string(),
                required: amount.to_string(),
            });
        }

        let mut compensation = CompensationStack::new();
        let debit = self
            .sub_ledger
            .withdraw(agent_id, amount, Some(destination), Some("withdraw to bank"))
            .await?;

        let sub_ledger = self.sub_ledger.clone();
        let agent_id_owned = agent_id.to_string();
        compensation.push(async move {
            if let Err(err) = sub_ledger
                .deposit(&agent_id_owned, amount, Some("withdraw_compensation"), Some("reversal of failed outbound transfer"))
                .await
            {
                tracing::error!(agent_id = %agent_id_owned, error = %err, "withdraw compensation failed");
            }
        });

        let money = Money::new(amount, currency);
        match self.treasury.create_outbound_payment(&money, destination).await {
            Ok(transfer) => {
                info!(agent_id, transfer_id = %transfer.id, "outbound transfer created");
                Ok(FlowOutcome::completed(vec![debit.record_id], Some(transfer.id)))
            }
            Err(err) => {
                warn!(agent_id, error = %err, "outbound transfer failed, compensating");
                compensation.unwind().await;
                Err(Error::Treasury(err.to_string()))
            }
        }
    }

    /// Open an off-ramp session for converting on-chain value to a
    /// card-funding credit. Returns `Pending` immediately; balances are
    /// untouched until [`FiatOrchestrator::on_ramp_update`] observes
    /// `Completed`.
    pub async fn start_fund_card_from_crypto(&self, agent_id: &str, amount: Decimal, currency: Currency, source_address: &str) -> Result<FlowOutcome> {
        self.start_ramp_session(agent_id, amount, currency, source_address, SessionKind::CardFunding).await
    }

    /// Same two-phase shape as card funding, but the completed session
    /// credits the agent's available balance directly rather than
    /// funding the card issuing balance.
    pub async fn start_crypto_to_fiat(&self, agent_id: &str, amount: Decimal, currency: Currency, source_address: &str) -> Result<FlowOutcome> {
        self.start_ramp_session(agent_id, amount, currency, source_address, SessionKind::ToFiat).await
    }

    async fn start_ramp_session(&self, agent_id: &str, amount: Decimal, currency: Currency, source_address: &str, kind: SessionKind) -> Result<FlowOutcome> {
        let money = Money::new(amount, currency.clone());
        let session = self.ramp.create_session(&money, source_address).await.map_err(|e| Error::Treasury(e.to_string()))?;
        self.sessions.insert(
            session.session_id.clone(),
            PendingRamp { agent_id: agent_id.to_string(), amount, currency, kind },
        );
        info!(agent_id, session_id = %session.session_id, "ramp session opened, waiting for completion");
        Ok(FlowOutcome::pending(Some(session.session_id)))
    }

    /// Re-query a ramp session's authoritative status and, once
    /// `Completed`, perform the crediting this flow was waiting on.
    /// Idempotent: a session already resolved is removed from the
    /// pending map on its first completion, so redelivered webhooks
    /// asking about a stale session id fail with `unknown_session`.
    pub async fn on_ramp_update(&self, session_id: &str) -> Result<FlowOutcome> {
        let pending = self
            .sessions
            .get(session_id)
            .map(|entry| (entry.agent_id.clone(), entry.amount, entry.currency.clone(), entry.kind))
            .ok_or_else(|| Error::UnknownSession(session_id.to_string()))?;
        let (agent_id, amount, currency, kind) = pending;

        let session = self.ramp.get_session_status(session_id).await.map_err(|e| Error::Treasury(e.to_string()))?;
        match session.status {
            RampStatus::Pending => Ok(FlowOutcome::pending(Some(session_id.to_string()))),
            RampStatus::Failed => {
                self.sessions.remove(session_id);
                Ok(FlowOutcome::failed("chain_submission_failed", format!("ramp session {session_id} failed")))
            }
            RampStatus::Completed => {
                self.sessions.remove(session_id);
                let record = self
                    .sub_ledger
                    .deposit(&agent_id, amount, Some(session_id), Some("crypto off-ramp completed"))
                    .await?;
                let mut record_ids = vec![record.record_id];
                if kind == SessionKind::CardFunding {
                    let money = Money::new(amount, currency);
                    let transfer = self.treasury.fund_issuing_balance(&money).await.map_err(|e| Error::Treasury(e.to_string()))?;
                    info!(agent_id = %agent_id, transfer_id = %transfer.id, "issuing balance funded");
                }
                Ok(FlowOutcome::completed(record_ids.drain(..).collect(), Some(session_id.to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledger_engine::{Config as LedgerConfig, LedgerEngine};
    use ports::error::PortError;
    use ports::traits::{PortResult, RampSession, TreasuryTransfer};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct FakeTreasury {
        fail_outbound: bool,
        issuing_calls: AtomicU32,
    }

    #[async_trait]
    impl TreasuryPort for FakeTreasury {
        async fn get_balance(&self) -> PortResult<Money> {
            Ok(Money::new(Decimal::ZERO, Currency::new("USD")))
        }
        async fn create_outbound_payment(&self, _amount: &Money, _destination: &str) -> PortResult<TreasuryTransfer> {
            if self.fail_outbound {
                Err(PortError::Unavailable("bank rail down".to_string()))
            } else {
                Ok(TreasuryTransfer { id: "tr_1".to_string(), status: "completed".to_string() })
            }
        }
        async fn fund_issuing_balance(&self, _amount: &Money) -> PortResult<TreasuryTransfer> {
            self.issuing_calls.fetch_add(1, Ordering::SeqCst);
            Ok(TreasuryTransfer { id: "tr_issuing".to_string(), status: "completed".to_string() })
        }
        async fn handle_webhook(&self, _payload: &[u8], _signature: &[u8]) -> PortResult<bool> {
            Ok(true)
        }
    }

    struct FakeRamp {
        status: std::sync::Mutex<RampStatus>,
    }

    #[async_trait]
    impl RampPort for FakeRamp {
        async fn create_session(&self, _amount: &Money, _source_address: &str) -> PortResult<RampSession> {
            Ok(RampSession { session_id: "session_1".to_string(), status: *self.status.lock().unwrap() })
        }
        async fn get_session_status(&self, session_id: &str) -> PortResult<RampSession> {
            Ok(RampSession { session_id: session_id.to_string(), status: *self.status.lock().unwrap() })
        }
    }

    fn test_sub_ledger() -> (Arc<SubLedger>, TempDir, TempDir) {
        let ledger_dir = TempDir::new().unwrap();
        let sub_dir = TempDir::new().unwrap();
        let mut ledger_config = LedgerConfig::default();
        ledger_config.data_dir = ledger_dir.path().to_path_buf();
        let ledger = Arc::new(LedgerEngine::open(ledger_config).unwrap());
        let mut config = sub_ledger::Config::default();
        config.data_dir = sub_dir.path().to_path_buf();
        let sub = Arc::new(SubLedger::open(ledger, config).unwrap());
        sub.create_account("agent-1").unwrap();
        (sub, ledger_dir, sub_dir)
    }

    #[tokio::test]
    async fn withdraw_to_bank_debits_then_transfers() {
        let (sub, _ld, _sd) = test_sub_ledger();
        sub.deposit("agent-1", Decimal::new(10_000, 2), None, None).await.unwrap();
        let treasury = Arc::new(FakeTreasury { fail_outbound: false, issuing_calls: AtomicU32::new(0) });
        let ramp = Arc::new(FakeRamp { status: std::sync::Mutex::new(RampStatus::Pending) });
        let orchestrator = FiatOrchestrator::new(sub.clone(), treasury, ramp);

        let outcome = orchestrator
            .withdraw_to_bank("agent-1", Decimal::new(4_000, 2), Currency::new("USD"), "bank_acct_1")
            .await
            .unwrap();
        assert_eq!(outcome.status, crate::types::FlowStatus::Completed);
        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.available, Decimal::new(6_000, 2));
    }

    #[tokio::test]
    async fn failed_outbound_transfer_is_compensated() {
        let (sub, _ld, _sd) = test_sub_ledger();
        sub.deposit("agent-1", Decimal::new(10_000, 2), None, None).await.unwrap();
        let treasury = Arc::new(FakeTreasury { fail_outbound: true, issuing_calls: AtomicU32::new(0) });
        let ramp = Arc::new(FakeRamp { status: std::sync::Mutex::new(RampStatus::Pending) });
        let orchestrator = FiatOrchestrator::new(sub.clone(), treasury, ramp);

        let result = orchestrator
            .withdraw_to_bank("agent-1", Decimal::new(4_000, 2), Currency::new("USD"), "bank_acct_1")
            .await;
        assert!(result.is_err());
        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.available, Decimal::new(10_000, 2));
    }

    #[tokio::test]
    async fn card_funding_waits_for_completion_before_crediting() {
        let (sub, _ld, _sd) = test_sub_ledger();
        let treasury = Arc::new(FakeTreasury { fail_outbound: false, issuing_calls: AtomicU32::new(0) });
        let ramp = Arc::new(FakeRamp { status: std::sync::Mutex::new(RampStatus::Pending) });
        let orchestrator = FiatOrchestrator::new(sub.clone(), treasury.clone(), ramp.clone());

        let outcome = orchestrator
            .start_fund_card_from_crypto("agent-1", Decimal::new(5_000, 2), Currency::new("USD"), "0xsource")
            .await
            .unwrap();
        assert_eq!(outcome.status, crate::types::FlowStatus::Pending);
        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.available, Decimal::ZERO);
        assert_eq!(treasury.issuing_calls.load(Ordering::SeqCst), 0);

        *ramp.status.lock().unwrap() = RampStatus::Completed;
        let session_id = outcome.external_ref.unwrap();
        let completed = orchestrator.on_ramp_update(&session_id).await.unwrap();
        assert_eq!(completed.status, crate::types::FlowStatus::Completed);
        let balances = sub.balances("agent-1").unwrap();
        assert_eq!(balances.available, Decimal::new(5_000, 2));
        assert_eq!(treasury.issuing_calls.load(Ordering::SeqCst), 1);
    }
}
