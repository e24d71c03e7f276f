//! Mandate chain verification (C3)
//!
//! Validates `{intent, cart, payment}` end to end: expiry, nonce
//! uniqueness, subject binding, amount ordering, the recomputed
//! `audit_hash`, and each artifact's cryptographic proof.

use crate::config::VerifierConfig;
use crate::encoding::hex_decode;
use crate::error::VerificationError;
use crate::nonce_window::NonceWindow;
use chrono::Utc;
use ports::canonical::canonical_bytes;
use ports::mandate::compute_audit_hash;
use ports::traits::SigningPort;
use ports::{Cart, Intent, MandateChain, Payment, Proof};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of verifying a mandate chain, mirroring the `(valid, reason?)`
/// contract from `spec.md §4.3`.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub valid: bool,
    pub reason: Option<String>,
}

impl VerificationOutcome {
    fn ok() -> Self {
        Self { valid: true, reason: None }
    }

    fn failed(err: &VerificationError) -> Self {
        Self {
            valid: false,
            reason: Some(format!("{err}")),
        }
    }
}

/// Verifies mandate chains against a signing port, deduplicating nonces
/// within a configurable sliding window.
pub struct MandateVerifier {
    config: VerifierConfig,
    signer: Arc<dyn SigningPort>,
    nonces: NonceWindow,
}

impl MandateVerifier {
    /// Build a verifier backed by `signer`.
    pub fn new(config: VerifierConfig, signer: Arc<dyn SigningPort>) -> Self {
        let nonces = NonceWindow::new(config.nonce_window_seconds);
        Self { config, signer, nonces }
    }

    /// Validate a full chain, returning the structured error on failure
    /// rather than `verify`'s flattened `(valid, reason)` pair — callers
    /// that need a machine-readable `error_code` (the payment executor's
    /// compensation path) should use this instead of string-matching
    /// `VerificationOutcome::reason`.
    pub async fn verify_detailed(&self, chain: &MandateChain) -> Result<(), VerificationError> {
        self.verify_inner(chain).await
    }

    /// Validate a full chain; any single failure is fatal for the request.
    pub async fn verify(&self, chain: &MandateChain) -> VerificationOutcome {
        match self.verify_inner(chain).await {
            Ok(()) => {
                info!(mandate_id = %chain.intent.mandate_id, "mandate chain verified");
                VerificationOutcome::ok()
            }
            Err(err) => {
                warn!(mandate_id = %chain.intent.mandate_id, error = %err, "mandate verification failed");
                VerificationOutcome::failed(&err)
            }
        }
    }

    async fn verify_inner(&self, chain: &MandateChain) -> Result<(), VerificationError> {
        let now = Utc::now();
        self.check_expiry(&chain.intent, &chain.cart, &chain.payment, now)?;
        self.check_nonces(&chain.intent, &chain.cart, &chain.payment)?;
        self.check_subjects(&chain.intent, &chain.payment)?;
        self.check_amounts(&chain.intent, &chain.cart, &chain.payment)?;
        self.check_audit_hash(chain)?;
        self.check_proof(&chain.intent.proof, &canonical_bytes(&chain.intent)).await?;
        self.check_proof(&chain.cart.proof, &canonical_bytes(&chain.cart)).await?;
        self.check_proof(&chain.payment.proof, &canonical_bytes(&chain.payment)).await?;
        Ok(())
    }

    fn check_expiry(
        &self,
        intent: &Intent,
        cart: &Cart,
        payment: &Payment,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        if intent.expires_at < now {
            return Err(VerificationError::ExpiredMandate(intent.mandate_id.clone()));
        }
        if cart.expires_at < now {
            return Err(VerificationError::ExpiredMandate(cart.mandate_id.clone()));
        }
        if payment.expires_at < now {
            return Err(VerificationError::ExpiredMandate(payment.mandate_id.clone()));
        }
        Ok(())
    }

    fn check_nonces(
        &self,
        intent: &Intent,
        cart: &Cart,
        payment: &Payment,
    ) -> Result<(), VerificationError> {
        if !self.nonces.check_and_record(&intent.nonce) {
            return Err(VerificationError::NonceReused(intent.nonce.clone()));
        }
        if !self.nonces.check_and_record(&cart.nonce) {
            return Err(VerificationError::NonceReused(cart.nonce.clone()));
        }
        if !self.nonces.check_and_record(&payment.nonce) {
            return Err(VerificationError::NonceReused(payment.nonce.clone()));
        }
        Ok(())
    }

    fn check_subjects(&self, intent: &Intent, payment: &Payment) -> Result<(), VerificationError> {
        if intent.subject != payment.subject {
            return Err(VerificationError::SubjectMismatch);
        }
        Ok(())
    }

    fn check_amounts(
        &self,
        intent: &Intent,
        cart: &Cart,
        payment: &Payment,
    ) -> Result<(), VerificationError> {
        if payment.amount_minor > intent.authorized_amount_minor {
            return Err(VerificationError::AmountExceedsAuthorized {
                payment_minor: payment.amount_minor,
                authorized_minor: intent.authorized_amount_minor,
            });
        }
        let cart_total = cart.total_minor();
        if payment.amount_minor != cart_total {
            return Err(VerificationError::AmountMismatch {
                payment_minor: payment.amount_minor,
                cart_total_minor: cart_total,
            });
        }
        Ok(())
    }

    fn check_audit_hash(&self, chain: &MandateChain) -> Result<(), VerificationError> {
        let recomputed = compute_audit_hash(
            &chain.cart.mandate_id,
            &chain.checkout_id,
            chain.payment.amount_minor,
            &chain.payment.chain,
            &chain.payment.token,
            &chain.payment.destination,
        );
        if recomputed != chain.payment.audit_hash {
            return Err(VerificationError::AuditHashMismatch);
        }
        Ok(())
    }

    async fn check_proof(&self, proof: &Proof, payload: &[u8]) -> Result<(), VerificationError> {
        let public_key = hex_decode(&proof.verification_method).ok_or_else(|| {
            VerificationError::MalformedProof(
                proof.verification_method.clone(),
                "verification_method is not valid hex".to_string(),
            )
        })?;
        let signature = hex_decode(&proof.proof_value).ok_or_else(|| {
            VerificationError::MalformedProof(
                proof.proof_value.clone(),
                "proof_value is not valid hex".to_string(),
            )
        })?;

        let verified = self
            .signer
            .verify(payload, &signature, &public_key, proof.algorithm)
            .await
            .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;

        if !verified {
            return Err(VerificationError::InvalidSignature(proof.verification_method.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use ports::mandate::{Cart, Intent, LineItem, Payment, Proof, ProofAlgorithm};
    use ports::money::Currency;
    use ports::traits::PortResult;
    use std::collections::HashMap;

    struct AlwaysValidSigner;

    #[async_trait]
    impl SigningPort for AlwaysValidSigner {
        async fn sign(&self, _payload: &[u8], _key_id: &str) -> PortResult<Vec<u8>> {
            Ok(vec![0u8; 64])
        }
        async fn verify(
            &self,
            _payload: &[u8],
            _signature: &[u8],
            _public_key: &[u8],
            _algorithm: ProofAlgorithm,
        ) -> PortResult<bool> {
            Ok(true)
        }
    }

    struct AlwaysInvalidSigner;

    #[async_trait]
    impl SigningPort for AlwaysInvalidSigner {
        async fn sign(&self, _payload: &[u8], _key_id: &str) -> PortResult<Vec<u8>> {
            Ok(vec![0u8; 64])
        }
        async fn verify(
            &self,
            _payload: &[u8],
            _signature: &[u8],
            _public_key: &[u8],
            _algorithm: ProofAlgorithm,
        ) -> PortResult<bool> {
            Ok(false)
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

    fn happy_chain() -> MandateChain {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(10);

        let intent = Intent {
            mandate_id: "intent-1".to_string(),
            subject: "agent-1".to_string(),
            issuer: "agent-platform".to_string(),
            scope: vec!["payments:write".to_string()],
            authorized_amount_minor: 50_000_000,
            expires_at,
            nonce: "nonce-intent-1".to_string(),
            proof: fake_proof(),
        };

        let cart = Cart {
            mandate_id: "cart-1".to_string(),
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
            nonce: "nonce-cart-1".to_string(),
            proof: fake_proof(),
        };

        let audit_hash = compute_audit_hash("cart-1", "checkout-1", 25_000_000, "base", "USDC", "0xdead");

        let payment = Payment {
            mandate_id: "payment-1".to_string(),
            subject: "agent-1".to_string(),
            chain: "base".to_string(),
            token: "USDC".to_string(),
            amount_minor: 25_000_000,
            destination: "0xdead".to_string(),
            audit_hash,
            expires_at,
            nonce: "nonce-payment-1".to_string(),
            proof: fake_proof(),
        };

        MandateChain {
            intent,
            cart,
            checkout_id: "checkout-1".to_string(),
            payment,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn accepts_a_well_formed_chain() {
        let verifier = MandateVerifier::new(VerifierConfig::default(), Arc::new(AlwaysValidSigner));
        let outcome = verifier.verify(&happy_chain()).await;
        assert!(outcome.valid, "{:?}", outcome.reason);
    }

    #[tokio::test]
    async fn rejects_expired_mandate() {
        let mut chain = happy_chain();
        chain.intent.expires_at = Utc::now() - Duration::minutes(1);
        let verifier = MandateVerifier::new(VerifierConfig::default(), Arc::new(AlwaysValidSigner));
        let outcome = verifier.verify(&chain).await;
        assert!(!outcome.valid);
    }

    #[tokio::test]
    async fn rejects_replayed_nonce_across_calls() {
        let verifier = MandateVerifier::new(VerifierConfig::default(), Arc::new(AlwaysValidSigner));
        let chain = happy_chain();
        assert!(verifier.verify(&chain).await.valid);
        assert!(!verifier.verify(&chain).await.valid);
    }

    #[tokio::test]
    async fn rejects_tampered_destination_via_audit_hash() {
        let mut chain = happy_chain();
        chain.payment.destination = "0xbeef".to_string();
        let verifier = MandateVerifier::new(VerifierConfig::default(), Arc::new(AlwaysValidSigner));
        let outcome = verifier.verify(&chain).await;
        assert!(!outcome.valid);
        assert!(outcome.reason.unwrap().contains("audit_hash"));
    }

    #[tokio::test]
    async fn rejects_amount_over_intent_authorization() {
        let mut chain = happy_chain();
        chain.intent.authorized_amount_minor = 1_000;
        let verifier = MandateVerifier::new(VerifierConfig::default(), Arc::new(AlwaysValidSigner));
        assert!(!verifier.verify(&chain).await.valid);
    }

    #[tokio::test]
    async fn rejects_invalid_signature() {
        let verifier = MandateVerifier::new(VerifierConfig::default(), Arc::new(AlwaysInvalidSigner));
        let outcome = verifier.verify(&happy_chain()).await;
        assert!(!outcome.valid);
    }
}
