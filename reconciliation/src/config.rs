//! Reconciliation engine configuration (`spec.md §4.8`)

use serde::{Deserialize, Serialize};

/// Tunables for the discrepancy classifier and scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How often the background pass runs.
    pub interval_seconds: u64,
    /// Fractional amount tolerance: `|ledger - chain| > tolerance * max(ledger, chain)`.
    pub amount_tolerance: f64,
    /// Discrepancies at or below this absolute minor-unit delta auto-resolve
    /// (`Ignore`) regardless of the fractional tolerance check.
    pub auto_resolve_threshold_minor: i128,
    /// Confirmation-timestamp skew, beyond which an otherwise-matching
    /// pair is flagged `timing_discrepancy` instead of accepted outright.
    pub timing_skew_seconds: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            amount_tolerance: 0.0001,
            auto_resolve_threshold_minor: 0,
            timing_skew_seconds: 120,
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults for absent fields.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| crate::error::Error::Config(e.to_string()))?;
        toml::from_str(&contents).map_err(|e| crate::error::Error::Config(e.to_string()))
    }
}
