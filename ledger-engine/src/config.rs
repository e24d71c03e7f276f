//! Ledger engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// RocksDB tuning, mirrored from the defaults this platform's storage
/// layer has always used in production.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    pub write_buffer_size_mb: u64,
    pub max_write_buffer_number: i32,
    pub target_file_size_mb: u64,
    pub max_background_jobs: i32,
    pub level0_file_num_compaction_trigger: i32,
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

/// Top-level ledger engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub service_name: String,
    pub rocksdb: RocksDbConfig,
    /// Write a balance snapshot every this many entries per (account, currency).
    pub snapshot_interval: u64,
    /// Default lock acquisition timeout, in milliseconds.
    pub lock_timeout_ms: u64,
    /// How long a held lock lives before it is reclaimable, in milliseconds.
    pub lock_ttl_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "ledger-engine".to_string(),
            rocksdb: RocksDbConfig::default(),
            snapshot_interval: 1000,
            lock_timeout_ms: 5_000,
            lock_ttl_ms: 30_000,
        }
    }
}

impl Config {
    /// Load from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, crate::error::Error> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| crate::error::Error::Storage(format!("invalid config: {e}")))
    }
}
