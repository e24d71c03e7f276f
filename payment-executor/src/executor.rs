//! The payment executor (C11): verify → preflight → dispatch → record

use crate::config::Config;
use crate::types::{ExecutorResult, PaymentState};
use audit_trail::AuditTrail;
use chain_manager::{ChainManager, SettlementMode, SettlementRequest, SettlementStatus};
use compliance_engine::ComplianceEngine;
use hybrid_ledger::HybridLedger;
use ledger_engine::{EntryDraft, EntryType};
use mandate_verifier::MandateVerifier;
use ports::money::Money;
use ports::MandateChain;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// The composition root wiring C3 → C2 → C9 → C7 together, matching
/// `spec.md §4.11`'s state machine.
pub struct PaymentExecutor {
    verifier: Arc<MandateVerifier>,
    compliance: Arc<ComplianceEngine>,
    chain_manager: Arc<ChainManager>,
    ledger: Arc<HybridLedger>,
    audit: Arc<AuditTrail>,
    config: Config,
}

impl PaymentExecutor {
    pub fn new(
        verifier: Arc<MandateVerifier>,
        compliance: Arc<ComplianceEngine>,
        chain_manager: Arc<ChainManager>,
        ledger: Arc<HybridLedger>,
        audit: Arc<AuditTrail>,
        config: Config,
    ) -> Self {
        Self { verifier, compliance, chain_manager, ledger, audit, config }
    }

    /// Run one payment through the full pipeline. Never returns `Err`
    /// — every outcome, including a pipeline error, is reported as an
    /// [`ExecutorResult`] so the caller always gets a machine-readable
    /// `error_code` and an `audit_id`.
    pub async fn execute(&self, chain: MandateChain, mode_override: Option<SettlementMode>) -> ExecutorResult {
        let mandate_id = chain.intent.mandate_id.clone();
        info!(mandate_id = %mandate_id, "payment received");

        if let Err(verr) = self.verifier.verify_detailed(&chain).await {
            warn!(mandate_id = %mandate_id, error = %verr, "mandate rejected");
            let audit_id = self
                .audit
                .record(
                    "mandate.verification.failed",
                    serde_json::json!({
                        "mandate_id": mandate_id,
                        "checkout_id": chain.checkout_id,
                        "reason": verr.to_string(),
                        "error_code": verr.error_code(),
                    }),
                )
                .ok()
                .map(|r| r.entry_id.to_string());
            return ExecutorResult::rejected(verr.error_code(), verr.to_string(), audit_id);
        }

        let preflight = match self.compliance.preflight(&chain).await {
            Ok(p) => p,
            Err(e) => return ExecutorResult::failed("provider_unavailable", e.to_string(), None, None, None),
        };
        if !preflight.allowed {
            info!(mandate_id = %mandate_id, rule_id = %preflight.rule_id, "payment denied by compliance");
            return ExecutorResult::denied(preflight.rule_id, preflight.reason, preflight.audit_id);
        }

        let entry = match self.write_debit(&chain).await {
            Ok(entry) => entry,
            Err(err) => {
                return ExecutorResult::failed(
                    "provider_unavailable",
                    err.to_string(),
                    None,
                    None,
                    Some(preflight.audit_id.clone()),
                )
            }
        };

        let settlement_id = Uuid::new_v4();
        let request = SettlementRequest { settlement_id, payment: chain.payment.clone(), mode_override };
        let holder_id = format!("payment_executor:{mandate_id}");

        let dispatch = tokio::time::timeout(
            Duration::from_millis(self.config.pipeline_timeout_ms),
            self.chain_manager.dispatch(request),
        )
        .await;

        let outcome = match dispatch {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(mandate_id = %mandate_id, "settlement dispatch exceeded the pipeline deadline");
                self.compensate(&entry.entry_id, &holder_id, &mandate_id, "request_timeout").await;
                return ExecutorResult::failed(
                    "request_timeout",
                    "settlement dispatch exceeded the pipeline deadline".to_string(),
                    Some(entry.entry_id),
                    Some(settlement_id),
                    Some(preflight.audit_id),
                );
            }
        };

        match outcome.status {
            SettlementStatus::Confirmed => {
                let audit_id = self
                    .audit
                    .record(
                        "settlement.confirmed",
                        serde_json::json!({
                            "mandate_id": mandate_id,
                            "settlement_id": settlement_id,
                            "entry_id": entry.entry_id,
                            "tx_hash": &outcome.tx_hash,
                        }),
                    )
                    .ok()
                    .map(|r| r.entry_id.to_string());
                ExecutorResult::accepted(PaymentState::Recorded, entry.entry_id, settlement_id, outcome.tx_hash, audit_id)
            }
            SettlementStatus::Submitted | SettlementStatus::Pending => {
                let audit_id = self
                    .audit
                    .record(
                        "settlement.submitted",
                        serde_json::json!({
                            "mandate_id": mandate_id,
                            "settlement_id": settlement_id,
                            "entry_id": entry.entry_id,
                            "batch_id": &outcome.batch_id,
                        }),
                    )
                    .ok()
                    .map(|r| r.entry_id.to_string());
                ExecutorResult::accepted(PaymentState::Submitted, entry.entry_id, settlement_id, None, audit_id)
            }
            SettlementStatus::Failed => {
                let reason = outcome.failure_reason.unwrap_or_else(|| "settlement failed".to_string());
                self.compensate(&entry.entry_id, &holder_id, &mandate_id, &reason).await;
                ExecutorResult::failed(
                    "chain_submission_failed",
                    reason,
                    Some(entry.entry_id),
                    Some(settlement_id),
                    Some(preflight.audit_id),
                )
            }
        }
    }

    /// Write the optimistic debit entry for the payment's subject
    /// account, before the chain is ever called — so a post-dispatch
    /// failure has something concrete to reverse.
    async fn write_debit(&self, chain: &MandateChain) -> hybrid_ledger::Result<ledger_engine::LedgerEntry> {
        let amount = Money::from_minor_units(chain.payment.amount_minor, chain.cart.currency.clone()).amount;
        let mut metadata = HashMap::new();
        metadata.insert("mandate_id".to_string(), chain.intent.mandate_id.clone());
        metadata.insert("checkout_id".to_string(), chain.checkout_id.clone());
        let draft = EntryDraft {
            tx_id: Uuid::new_v4(),
            account_id: chain.payment.subject.clone(),
            entry_type: EntryType::Debit,
            amount,
            fee: rust_decimal::Decimal::ZERO,
            currency: chain.cart.currency.as_str().to_string(),
            chain: Some(chain.payment.chain.clone()),
            chain_tx_hash: None,
            block_number: None,
            audit_anchor: None,
            metadata,
            explicit_sign: None,
        };
        self.ledger.write(draft, &format!("payment_executor:{}", chain.intent.mandate_id)).await
    }

    /// Reverse the optimistic debit and record the failure, per
    /// `spec.md §4.11`'s "on any failure after dispatch" compensation
    /// path. Compensation failure is logged at `invariant_violated`
    /// severity and surfaced distinctly from the triggering failure.
    async fn compensate(&self, entry_id: &Uuid, holder_id: &str, mandate_id: &str, reason: &str) {
        if let Err(reverse_err) = self.ledger.reverse(*entry_id, holder_id).await {
            tracing::error!(
                mandate_id,
                entry_id = %entry_id,
                error = %reverse_err,
                "compensation failed: invariant_violated"
            );
            let _ = self.audit.record(
                "compensation.failed",
                serde_json::json!({
                    "mandate_id": mandate_id,
                    "entry_id": entry_id,
                    "trigger_reason": reason,
                    "compensation_error": reverse_err.to_string(),
                }),
            );
            return;
        }
        let _ = self.audit.record(
            "settlement.failed",
            serde_json::json!({
                "mandate_id": mandate_id,
                "entry_id": entry_id,
                "reason": reason,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chain_manager::Config as ChainConfig;
    use compliance_engine::ComplianceEngine;
    use hybrid_ledger::Config as HybridConfig;
    use ledger_engine::{Config as LedgerConfig, LedgerEngine};
    use mandate_verifier::VerifierConfig;
    use ports::error::PortError;
    use ports::mandate::{Cart, Intent, LineItem, Payment, Proof, ProofAlgorithm};
    use ports::mandate::compute_audit_hash;
    use ports::money::{Currency, Money};
    use ports::traits::{
        ChainExecutorPort, ChainTx, ComplianceDecision, ComplianceProviderPort, DispatchReceipt, GasEstimate,
        PortResult, SigningPort, WalletHandle,
    };
    use retry_caller::{CallerConfig, RetryableCaller};
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct AlwaysValidSigner;
    #[async_trait]
    impl SigningPort for AlwaysValidSigner {
        async fn sign(&self, _payload: &[u8], _key_id: &str) -> PortResult<Vec<u8>> {
            Ok(vec![0u8; 64])
        }
        async fn verify(&self, _payload: &[u8], _sig: &[u8], _pk: &[u8], _alg: ProofAlgorithm) -> PortResult<bool> {
            Ok(true)
        }
    }

    struct AlwaysAllow;
    #[async_trait]
    impl ComplianceProviderPort for AlwaysAllow {
        async fn evaluate(&self, _mandate_json: &[u8]) -> PortResult<ComplianceDecision> {
            Ok(ComplianceDecision { allowed: true, reason: None, rule_id: "ok".to_string(), provider: "rules".to_string() })
        }
    }

    struct AlwaysDeny;
    #[async_trait]
    impl ComplianceProviderPort for AlwaysDeny {
        async fn evaluate(&self, _mandate_json: &[u8]) -> PortResult<ComplianceDecision> {
            Ok(ComplianceDecision {
                allowed: false,
                reason: Some("sanctioned destination".to_string()),
                rule_id: "sanctions_hit".to_string(),
                provider: "rules".to_string(),
            })
        }
    }

    struct FakeChain {
        should_fail: bool,
    }
    #[async_trait]
    impl ChainExecutorPort for FakeChain {
        async fn dispatch(&self, payment: &Payment) -> PortResult<DispatchReceipt> {
            if self.should_fail {
                return Err(PortError::Transient("rpc timeout".to_string()));
            }
            Ok(DispatchReceipt {
                tx_hash: format!("0x{}", payment.nonce),
                chain: payment.chain.clone(),
                block_number: Some(100),
                gas_used: Some(21_000),
                audit_anchor: None,
            })
        }
        async fn estimate_gas(&self, _to: &str, _amount: &Money, _token: &str) -> PortResult<GasEstimate> {
            unimplemented!()
        }
        async fn get_transaction(&self, _hash: &str) -> PortResult<Option<ChainTx>> {
            unimplemented!()
        }
        async fn create_wallet(&self) -> PortResult<WalletHandle> {
            unimplemented!()
        }
    }

    fn fake_proof() -> Proof {
        Proof {
            proof_type: "DataIntegrityProof".to_string(),
            verification_method: "deadbeef".to_string(),
            proof_value: "beefdead".to_string(),
            algorithm: ProofAlgorithm::Ed25519,
        }
    }

    fn test_chain(nonce_suffix: &str) -> MandateChain {
        let now = chrono::Utc::now();
        let expires_at = now + chrono::Duration::minutes(10);
        let intent = Intent {
            mandate_id: format!("mandate-{nonce_suffix}"),
            subject: "agent-1".to_string(),
            issuer: "agent-platform".to_string(),
            scope: vec!["payments:write".to_string()],
            authorized_amount_minor: 50_000_000,
            expires_at,
            nonce: format!("nonce-intent-{nonce_suffix}"),
            proof: fake_proof(),
        };
        let cart = Cart {
            mandate_id: format!("mandate-{nonce_suffix}"),
            merchant_id: "merchant-1".to_string(),
            merchant_domain: "shop.example".to_string(),
            line_items: vec![LineItem {
                item_id: "item-1".to_string(),
                name: "widget".to_string(),
                quantity: 1,
                unit_price_minor: 25_000_000,
            }],
            currency: Currency::new("USDC"),
            subtotal_minor: 25_000_000,
            taxes_minor: 0,
            shipping_minor: 0,
            discounts: vec![],
            expires_at,
            nonce: format!("nonce-cart-{nonce_suffix}"),
            proof: fake_proof(),
        };
        let audit_hash = compute_audit_hash(&cart.mandate_id, "checkout-1", 25_000_000, "base", "USDC", "0xdead");
        let payment = Payment {
            mandate_id: format!("mandate-{nonce_suffix}"),
            subject: "agent-1".to_string(),
            chain: "base".to_string(),
            token: "USDC".to_string(),
            amount_minor: 25_000_000,
            destination: "0xdead".to_string(),
            audit_hash,
            expires_at,
            nonce: format!("nonce-payment-{nonce_suffix}"),
            proof: fake_proof(),
        };
        MandateChain { intent, cart, checkout_id: "checkout-1".to_string(), payment, metadata: HashMap::new() }
    }

    fn fast_caller() -> RetryableCaller {
        RetryableCaller::new(CallerConfig {
            retry: retry_caller::config::RetryConfig { max_retries: 0, initial_delay_ms: 1, base: 1.0, max_delay_ms: 2 },
            ..Default::default()
        })
    }

    struct Harness {
        executor: PaymentExecutor,
        _ledger_dir: TempDir,
        _audit_dir: TempDir,
    }

    async fn build_harness(compliance_allows: bool, chain_fails: bool) -> Harness {
        let ledger_dir = TempDir::new().unwrap();
        let audit_dir = TempDir::new().unwrap();

        let mut ledger_config = LedgerConfig::default();
        ledger_config.data_dir = ledger_dir.path().to_path_buf();
        let ledger = Arc::new(LedgerEngine::open(ledger_config).unwrap());

        let mut audit_config = audit_trail::Config::default();
        audit_config.data_dir = audit_dir.path().to_path_buf();
        let audit = Arc::new(AuditTrail::open(&audit_config).unwrap());

        let (hybrid, _rx) = HybridLedger::new(ledger, audit.clone(), HybridConfig::default());

        // Pre-fund the test subject so the optimistic debit in `execute()`
        // clears the ledger's insufficient-balance guard, mirroring
        // `hybrid-ledger`'s and `sub-ledger`'s own test fixtures.
        let funding = EntryDraft {
            tx_id: Uuid::new_v4(),
            account_id: "agent-1".to_string(),
            entry_type: EntryType::Credit,
            amount: Money::from_minor_units(100_000_000, Currency::new("USDC")).amount,
            fee: rust_decimal::Decimal::ZERO,
            currency: "USDC".to_string(),
            chain: None,
            chain_tx_hash: None,
            block_number: None,
            audit_anchor: None,
            metadata: Default::default(),
            explicit_sign: None,
        };
        hybrid.write(funding, "test-fixture").await.unwrap();

        let verifier = Arc::new(MandateVerifier::new(VerifierConfig::default(), Arc::new(AlwaysValidSigner)));

        let compliance_provider: Arc<dyn ComplianceProviderPort> =
            if compliance_allows { Arc::new(AlwaysAllow) } else { Arc::new(AlwaysDeny) };
        let compliance = Arc::new(ComplianceEngine::new(vec![("rules".to_string(), compliance_provider)], audit.clone()));

        let chain: Arc<dyn ChainExecutorPort> = Arc::new(FakeChain { should_fail: chain_fails });
        let chain_manager = Arc::new(ChainManager::new(chain, fast_caller(), ChainConfig::default()));

        let executor = PaymentExecutor::new(verifier, compliance, chain_manager, hybrid, audit, Config::default());
        Harness { executor, _ledger_dir: ledger_dir, _audit_dir: audit_dir }
    }

    #[tokio::test]
    async fn happy_path_confirms_and_records() {
        let harness = build_harness(true, false).await;
        let result = harness
            .executor
            .execute(test_chain("e1"), Some(SettlementMode::PerTx))
            .await;
        assert_eq!(result.status, ExecutorStatus::Accepted);
        assert_eq!(result.final_state, PaymentState::Recorded);
        assert!(result.tx_hash.is_some());
        assert!(result.ledger_entry_id.is_some());
    }

    #[tokio::test]
    async fn denied_by_compliance_never_touches_the_ledger() {
        let harness = build_harness(false, false).await;
        let result = harness
            .executor
            .execute(test_chain("e2"), Some(SettlementMode::PerTx))
            .await;
        assert_eq!(result.status, ExecutorStatus::Denied);
        assert_eq!(result.rule_id.as_deref(), Some("sanctions_hit"));
        assert!(result.ledger_entry_id.is_none());
    }

    #[tokio::test]
    async fn chain_failure_reverses_the_optimistic_debit() {
        let harness = build_harness(true, true).await;
        let chain = test_chain("e5");
        let subject = chain.payment.subject.clone();
        let balance_before = harness.executor.ledger.balance(&subject, "USDC", None).unwrap();
        let result = harness.executor.execute(chain, Some(SettlementMode::PerTx)).await;
        assert_eq!(result.status, ExecutorStatus::Failed);
        assert_eq!(result.error_code, Some("chain_submission_failed"));

        let balance = harness.executor.ledger.balance(&subject, "USDC", None).unwrap();
        assert_eq!(balance, balance_before, "the optimistic debit must be fully reversed");
    }

    #[tokio::test]
    async fn rejects_a_chain_with_an_invalid_proof() {
        let harness = build_harness(true, false).await;
        let mut chain = test_chain("e6");
        chain.payment.destination = "0xtampered".to_string();
        let result = harness.executor.execute(chain, Some(SettlementMode::PerTx)).await;
        assert_eq!(result.status, ExecutorStatus::Failed);
        assert_eq!(result.final_state, PaymentState::Rejected);
        assert_eq!(result.error_code, Some("audit_hash_mismatch"));
    }
}
