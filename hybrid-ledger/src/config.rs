//! Hybrid ledger configuration

use serde::{Deserialize, Serialize};

/// How strictly C5/C6 writes are coupled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Default: an audit append failure reverses the ledger write, so
    /// the two stores never observe a confirmed entry the other lacks.
    RequireDualWrite,
    /// The ledger write commits immediately; the audit append is queued
    /// on a bounded channel and retried durably by a background
    /// consumer that de-dupes on `entry_id` before re-appending.
    AsyncAudit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub write_mode: WriteMode,
    /// Capacity of the async-audit queue, only used in `AsyncAudit` mode.
    pub async_queue_capacity: usize,
    /// How often the cross-store sampling comparator runs.
    pub sample_interval_seconds: u64,
    /// How many recent entries the sampling comparator checks per run.
    pub sample_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::RequireDualWrite,
            async_queue_capacity: 1024,
            sample_interval_seconds: 60,
            sample_size: 50,
        }
    }
}
