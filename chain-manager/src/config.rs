//! Chain manager configuration (`spec.md §4.9`)

use crate::types::SettlementMode;
use serde::{Deserialize, Serialize};

/// Global defaults for settlement dispatch, overridable per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub default_mode: SettlementMode,
    pub max_batch_size: usize,
    pub min_batch_size: usize,
    pub batch_interval_seconds: u64,
    pub max_retry_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_mode: SettlementMode::PerTx,
            max_batch_size: 50,
            min_batch_size: 5,
            batch_interval_seconds: 30,
            max_retry_attempts: 3,
        }
    }
}

impl Config {
    /// Load from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| crate::error::Error::Config(e.to_string()))?;
        toml::from_str(&contents).map_err(|e| crate::error::Error::Config(e.to_string()))
    }
}
