//! Validation error taxonomy, per `spec.md §7`'s Validation category

use thiserror::Error;

/// Why a mandate chain failed verification. Any failure is fatal for
/// the request — the caller never proceeds past a verification error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("mandate expired at {0}")]
    ExpiredMandate(String),

    #[error("nonce already used within the dedup window: {0}")]
    NonceReused(String),

    #[error("intent and payment subjects do not match")]
    SubjectMismatch,

    #[error("payment amount {payment_minor} exceeds authorized amount {authorized_minor}")]
    AmountExceedsAuthorized {
        payment_minor: i128,
        authorized_minor: i128,
    },

    #[error("payment amount {payment_minor} does not match cart total {cart_total_minor}")]
    AmountMismatch {
        payment_minor: i128,
        cart_total_minor: i128,
    },

    #[error("audit_hash does not match the recomputed binding")]
    AuditHashMismatch,

    #[error("invalid signature on {0}")]
    InvalidSignature(String),

    #[error("malformed proof on {0}: {1}")]
    MalformedProof(String, String),
}

impl VerificationError {
    /// The machine-readable error code this maps to in the shared taxonomy.
    pub fn error_code(&self) -> &'static str {
        match self {
            VerificationError::ExpiredMandate(_) => "expired_mandate",
            VerificationError::NonceReused(_) => "nonce_reused",
            VerificationError::SubjectMismatch => "subject_mismatch",
            VerificationError::AmountExceedsAuthorized { .. } => "invalid_amount",
            VerificationError::AmountMismatch { .. } => "invalid_amount",
            VerificationError::AuditHashMismatch => "audit_hash_mismatch",
            VerificationError::InvalidSignature(_) => "invalid_signature",
            VerificationError::MalformedProof(..) => "invalid_signature",
        }
    }
}
