//! Prometheus instrumentation for the ledger engine

use crate::types::EntryType;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

/// Counters and histograms exported by the ledger engine.
pub struct Metrics {
    entries_total: IntCounterVec,
    snapshots_total: prometheus::IntCounter,
    write_duration: Histogram,
    registry: Registry,
}

impl Metrics {
    /// Register all series on a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let entries_total = IntCounterVec::new(
            Opts::new("ledger_entries_total", "Entries appended, by entry type"),
            &["entry_type"],
        )?;
        let snapshots_total = prometheus::IntCounter::new(
            "ledger_snapshots_total",
            "Balance snapshots written",
        )?;
        let write_duration = Histogram::with_opts(HistogramOpts::new(
            "ledger_write_duration_seconds",
            "Time spent in the ledger engine's write path",
        ))?;

        registry.register(Box::new(entries_total.clone()))?;
        registry.register(Box::new(snapshots_total.clone()))?;
        registry.register(Box::new(write_duration.clone()))?;

        Ok(Self {
            entries_total,
            snapshots_total,
            write_duration,
            registry,
        })
    }

    fn entry_type_label(entry_type: &EntryType) -> &'static str {
        match entry_type {
            EntryType::Credit => "credit",
            EntryType::Debit => "debit",
            EntryType::Transfer => "transfer",
            EntryType::Fee => "fee",
            EntryType::Refund => "refund",
            EntryType::Adjustment => "adjustment",
            EntryType::Reversal => "reversal",
        }
    }

    /// Record that an entry of `entry_type` was appended.
    pub fn record_entry_appended(&self, entry_type: &EntryType) {
        self.entries_total
            .with_label_values(&[Self::entry_type_label(entry_type)])
            .inc();
    }

    /// Record that a balance snapshot was written.
    pub fn record_snapshot_written(&self) {
        self.snapshots_total.inc();
    }

    /// Record the duration of a write-path operation.
    pub fn observe_write_duration(&self, seconds: f64) {
        self.write_duration.observe(seconds);
    }

    /// The registry these series are registered on, for composition-root wiring.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_entries_by_type() {
        let metrics = Metrics::new().unwrap();
        metrics.record_entry_appended(&EntryType::Credit);
        metrics.record_entry_appended(&EntryType::Debit);
        let families = metrics.registry().gather();
        let entries_family = families
            .iter()
            .find(|f| f.get_name() == "ledger_entries_total")
            .unwrap();
        let total: u64 = entries_family
            .get_metric()
            .iter()
            .map(|m| m.get_counter().get_value() as u64)
            .sum();
        assert_eq!(total, 2);
    }
}
