//! The mandate chain: intent → cart → payment
//!
//! Three signed, time-bounded artifacts whose binding proves an
//! authorized transaction. See `spec.md §3` and the UCP mandate models
//! in `original_source/packages/sardis-ucp/src/sardis_ucp/models/mandates.py`
//! for the discount/line-item shape this carries forward.

use crate::canonical::{canonical_bytes, sha256};
use crate::money::Currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Signature algorithm carried by a Data Integrity Proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofAlgorithm {
    /// Ed25519
    Ed25519,
    /// ECDSA over secp256k1
    EcdsaSecp256k1,
}

/// W3C VC "Data Integrity Proof" shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    /// Proof type, e.g. "DataIntegrityProof".
    pub proof_type: String,
    /// Key identifier / DID URL used to verify.
    pub verification_method: String,
    /// Signature bytes, base64 or hex encoded by the caller.
    pub proof_value: String,
    /// Algorithm used to produce `proof_value`.
    pub algorithm: ProofAlgorithm,
}

/// Declares what an agent may request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub mandate_id: String,
    pub subject: String,
    pub issuer: String,
    pub scope: Vec<String>,
    pub authorized_amount_minor: i128,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub proof: Proof,
}

/// Discount application mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountType {
    Percentage,
    Fixed,
    Coupon,
}

/// A discount applied to a cart, carried forward from the UCP model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub discount_id: String,
    pub discount_type: DiscountType,
    /// Percentage (0-100) or a fixed/coupon amount in minor units.
    pub value: Decimal,
    pub min_purchase_minor: i128,
}

impl Discount {
    /// Amount this discount removes from a subtotal, in minor units.
    pub fn calculate_minor(&self, subtotal_minor: i128) -> i128 {
        if subtotal_minor < self.min_purchase_minor {
            return 0;
        }
        match self.discount_type {
            DiscountType::Percentage => {
                let value_i128: i128 = self.value.trunc().try_into().unwrap_or(0);
                (subtotal_minor * value_i128) / 100
            }
            DiscountType::Fixed | DiscountType::Coupon => {
                let value_i128: i128 = self.value.trunc().try_into().unwrap_or(0);
                value_i128.min(subtotal_minor)
            }
        }
    }
}

/// A single cart line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_minor: i128,
}

/// Merchant's offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub mandate_id: String,
    pub merchant_id: String,
    pub merchant_domain: String,
    pub line_items: Vec<LineItem>,
    pub currency: Currency,
    pub subtotal_minor: i128,
    pub taxes_minor: i128,
    pub shipping_minor: i128,
    pub discounts: Vec<Discount>,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub proof: Proof,
}

impl Cart {
    /// Total discount across all line discounts.
    pub fn total_discount_minor(&self) -> i128 {
        self.discounts
            .iter()
            .map(|d| d.calculate_minor(self.subtotal_minor))
            .sum()
    }

    /// subtotal + taxes + shipping − discounts.
    pub fn total_minor(&self) -> i128 {
        self.subtotal_minor + self.taxes_minor + self.shipping_minor - self.total_discount_minor()
    }
}

/// Instruction to settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub mandate_id: String,
    pub subject: String,
    pub chain: String,
    pub token: String,
    pub amount_minor: i128,
    pub destination: String,
    pub audit_hash: [u8; 32],
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub proof: Proof,
}

/// Fields the payment's `audit_hash` binds together, in canonical order.
#[derive(Serialize)]
struct AuditHashInput<'a> {
    cart_id: &'a str,
    checkout_id: &'a str,
    amount_minor: i128,
    chain: &'a str,
    token: &'a str,
    destination: &'a str,
}

/// Recompute `audit_hash = SHA256(cart_id | checkout_id | amount_minor | chain | token | destination)`.
pub fn compute_audit_hash(
    cart_id: &str,
    checkout_id: &str,
    amount_minor: i128,
    chain: &str,
    token: &str,
    destination: &str,
) -> [u8; 32] {
    let input = AuditHashInput {
        cart_id,
        checkout_id,
        amount_minor,
        chain,
        token,
        destination,
    };
    sha256(&canonical_bytes(&input))
}

/// The full three-step authorization chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateChain {
    pub intent: Intent,
    pub cart: Cart,
    pub checkout_id: String,
    pub payment: Payment,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_hash_changes_when_destination_changes() {
        let h1 = compute_audit_hash("cart1", "chk1", 1000, "base", "USDC", "0xaaa");
        let h2 = compute_audit_hash("cart1", "chk1", 1000, "base", "USDC", "0xbbb");
        assert_ne!(h1, h2);
    }

    #[test]
    fn audit_hash_deterministic() {
        let h1 = compute_audit_hash("cart1", "chk1", 1000, "base", "USDC", "0xaaa");
        let h2 = compute_audit_hash("cart1", "chk1", 1000, "base", "USDC", "0xaaa");
        assert_eq!(h1, h2);
    }

    #[test]
    fn discount_respects_minimum_purchase() {
        let discount = Discount {
            discount_id: "d1".into(),
            discount_type: DiscountType::Fixed,
            value: Decimal::from(500),
            min_purchase_minor: 10_000,
        };
        assert_eq!(discount.calculate_minor(5_000), 0);
        assert_eq!(discount.calculate_minor(20_000), 500);
    }
}
