//! The compliance engine (C2): rule evaluation + audit emission, fail-closed

use crate::error::Result;
use crate::types::{PreflightResult, RULE_EVALUATION_ERROR_FAILCLOSED};
use audit_trail::AuditTrail;
use ports::mandate::MandateChain;
use ports::traits::ComplianceProviderPort;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives a primary→fallback chain of compliance providers and always
/// records the outcome to the audit trail, even on denial or error.
pub struct ComplianceEngine {
    providers: Vec<(String, Arc<dyn ComplianceProviderPort>)>,
    audit: Arc<AuditTrail>,
}

impl ComplianceEngine {
    /// `providers` is tried in order; the first to answer without
    /// erroring wins (a `allowed=false` answer is a real decision, not
    /// a provider failure, so it does not fall through).
    pub fn new(providers: Vec<(String, Arc<dyn ComplianceProviderPort>)>, audit: Arc<AuditTrail>) -> Self {
        Self { providers, audit }
    }

    pub async fn preflight(&self, mandate: &MandateChain) -> Result<PreflightResult> {
        let mandate_json = ports::canonical::canonical_bytes(mandate);

        let mut decision = None;
        for (name, provider) in &self.providers {
            match provider.evaluate(&mandate_json).await {
                Ok(d) => {
                    decision = Some(d);
                    break;
                }
                Err(err) => {
                    warn!(provider = %name, error = %err, "compliance provider errored, trying next");
                }
            }
        }

        let (allowed, reason, rule_id, provider_name) = match decision {
            Some(d) => (d.allowed, d.reason, d.rule_id, d.provider),
            None => {
                warn!("all compliance providers failed, failing closed");
                (
                    false,
                    Some("all configured providers were unavailable".to_string()),
                    RULE_EVALUATION_ERROR_FAILCLOSED.to_string(),
                    "none".to_string(),
                )
            }
        };

        let receipt = self.audit.record(
            "compliance.preflight",
            serde_json::json!({
                "mandate_id": mandate.intent.mandate_id,
                "checkout_id": mandate.checkout_id,
                "allowed": allowed,
                "reason": &reason,
                "rule_id": &rule_id,
                "provider": &provider_name,
            }),
        )?;

        if allowed {
            info!(mandate_id = %mandate.intent.mandate_id, rule_id = %rule_id, "compliance preflight allowed");
        } else {
            info!(mandate_id = %mandate.intent.mandate_id, rule_id = %rule_id, reason = ?reason, "compliance preflight denied");
        }

        Ok(PreflightResult {
            allowed,
            reason,
            rule_id,
            provider: provider_name,
            audit_id: receipt.entry_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ports::error::PortError;
    use ports::mandate::{Cart, Intent, Payment, Proof, ProofAlgorithm};
    use ports::money::Currency;
    use ports::traits::{ComplianceDecision, PortResult};
    use tempfile::TempDir;

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
            Ok(ComplianceDecision { allowed: false, reason: Some("blocked".to_string()), rule_id: "sanctioned".to_string(), provider: "rules".to_string() })
        }
    }

    struct AlwaysError;
    #[async_trait]
    impl ComplianceProviderPort for AlwaysError {
        async fn evaluate(&self, _mandate_json: &[u8]) -> PortResult<ComplianceDecision> {
            Err(PortError::Unavailable("vendor down".to_string()))
        }
    }

    fn fake_proof() -> Proof {
        Proof {
            proof_type: "Ed25519Signature2020".to_string(),
            verification_method: "00".to_string(),
            proof_value: "00".to_string(),
            algorithm: ProofAlgorithm::Ed25519,
        }
    }

    fn test_audit() -> (Arc<AuditTrail>, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = audit_trail::Config::default();
        config.data_dir = dir.path().to_path_buf();
        (Arc::new(AuditTrail::open(&config).unwrap()), dir)
    }

    fn test_chain() -> MandateChain {
        let now = chrono::Utc::now();
        let expires = now + chrono::Duration::minutes(5);
        let intent = Intent {
            mandate_id: "mandate_1".to_string(),
            subject: "agent_1".to_string(),
            issuer: "issuer_1".to_string(),
            scope: vec!["payments".to_string()],
            authorized_amount_minor: 50_000_000,
            expires_at: expires,
            nonce: "n1".to_string(),
            proof: fake_proof(),
        };
        let cart = Cart {
            mandate_id: "mandate_1".to_string(),
            merchant_id: "merchant_1".to_string(),
            merchant_domain: "merchant.example".to_string(),
            line_items: vec![],
            currency: Currency::new("USDC"),
            subtotal_minor: 25_000_000,
            taxes_minor: 0,
            shipping_minor: 0,
            discounts: vec![],
            expires_at: expires,
            nonce: "n2".to_string(),
            proof: fake_proof(),
        };
        let payment = Payment {
            mandate_id: "mandate_1".to_string(),
            subject: "agent_1".to_string(),
            chain: "base".to_string(),
            token: "USDC".to_string(),
            amount_minor: 25_000_000,
            destination: "0xdead".to_string(),
            audit_hash: [0u8; 32],
            expires_at: expires,
            nonce: "n3".to_string(),
            proof: fake_proof(),
        };
        MandateChain { intent, cart, checkout_id: "checkout_1".to_string(), payment, metadata: Default::default() }
    }

    #[tokio::test]
    async fn allows_and_audits_a_clean_mandate() {
        let (audit, _dir) = test_audit();
        let engine = ComplianceEngine::new(vec![("rules".to_string(), Arc::new(AlwaysAllow))], audit.clone());
        let result = engine.preflight(&test_chain()).await.unwrap();
        assert!(result.allowed);
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn denial_is_recorded_not_bypassed() {
        let (audit, _dir) = test_audit();
        let engine = ComplianceEngine::new(vec![("rules".to_string(), Arc::new(AlwaysDeny))], audit.clone());
        let result = engine.preflight(&test_chain()).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.rule_id, "sanctioned");
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_secondary_provider() {
        let (audit, _dir) = test_audit();
        let engine = ComplianceEngine::new(
            vec![
                ("primary".to_string(), Arc::new(AlwaysError) as Arc<dyn ComplianceProviderPort>),
                ("fallback".to_string(), Arc::new(AlwaysAllow)),
            ],
            audit,
        );
        let result = engine.preflight(&test_chain()).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.provider, "rules");
    }

    #[tokio::test]
    async fn fails_closed_when_every_provider_errors() {
        let (audit, _dir) = test_audit();
        let engine = ComplianceEngine::new(
            vec![("primary".to_string(), Arc::new(AlwaysError) as Arc<dyn ComplianceProviderPort>)],
            audit.clone(),
        );
        let result = engine.preflight(&test_chain()).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.rule_id, RULE_EVALUATION_ERROR_FAILCLOSED);
        assert_eq!(audit.len(), 1);
    }
}
