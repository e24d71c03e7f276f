//! Configuration for mandate verification

use serde::{Deserialize, Serialize};

/// Tunables for `MandateVerifier`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Sliding window, in seconds, within which a nonce may not repeat.
    pub nonce_window_seconds: i64,
    /// Key id passed to the signing port's `verify` call context; unused
    /// directly, kept for symmetry with the signing port's `sign`.
    pub default_key_id: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            nonce_window_seconds: 3600,
            default_key_id: "default".to_string(),
        }
    }
}
