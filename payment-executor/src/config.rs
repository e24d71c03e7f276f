//! Payment executor configuration (`spec.md §6` environment variables)

use chain_manager::SettlementMode;
use serde::{Deserialize, Serialize};

/// Process-wide pipeline configuration, read once at composition-root
/// start-up from the environment variables `spec.md §6` names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Overrides `chain-manager`'s configured default mode for every
    /// request that does not supply its own `mode_override`.
    pub settlement_mode: Option<SettlementMode>,
    /// Overall deadline for one `execute()` call, from dispatch through
    /// settlement. Exceeding it surfaces `request_timeout` and runs the
    /// same compensation path as a settlement failure.
    pub pipeline_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self { settlement_mode: None, pipeline_timeout_ms: 30_000 }
    }
}

impl Config {
    /// Read `SETTLEMENT_MODE` (`internal_only | per_tx | batched`) from
    /// the environment, if present.
    pub fn from_env() -> Self {
        let settlement_mode = std::env::var("SETTLEMENT_MODE").ok().and_then(|v| match v.as_str() {
            "internal_only" => Some(SettlementMode::InternalOnly),
            "per_tx" => Some(SettlementMode::PerTx),
            "batched" => Some(SettlementMode::Batched),
            _ => None,
        });
        Self { settlement_mode, ..Self::default() }
    }
}
