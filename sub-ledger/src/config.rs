//! Sub-ledger configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub default_currency: String,
    /// Threshold below which `reconcile()`'s diff is considered reconciled, in minor units.
    pub reconcile_tolerance_minor: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/sub-ledger"),
            default_currency: "USD".to_string(),
            reconcile_tolerance_minor: 1,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, crate::error::Error> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| crate::error::Error::Storage(format!("invalid config: {e}")))
    }
}
