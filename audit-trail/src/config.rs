//! Audit trail configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    /// How often the background anchoring task publishes the current
    /// Merkle root via `AnchorPort`, if one is configured.
    pub anchor_interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/audit"),
            anchor_interval_seconds: 300,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, crate::error::Error> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| crate::error::Error::Storage(format!("invalid config: {e}")))
    }
}
