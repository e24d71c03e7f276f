//! Metrics for the retryable-caller wrapper
//!
//! - `caller_attempts_total` - attempts made, labeled by provider
//! - `caller_retries_total` - retries (attempts beyond the first)
//! - `caller_circuit_open_total` - calls rejected by an open circuit
//! - `caller_attempt_duration_seconds` - per-attempt latency histogram

use prometheus::{
    register_histogram, register_int_counter_vec, Histogram, IntCounterVec, Registry,
};
use std::sync::Arc;

/// Metrics collector for `RetryableCaller`.
#[derive(Clone)]
pub struct Metrics {
    /// Attempts made, labeled by provider.
    pub attempts_total: IntCounterVec,
    /// Retries (attempts beyond the first), labeled by provider.
    pub retries_total: IntCounterVec,
    /// Calls rejected because the circuit was open, labeled by provider.
    pub circuit_open_total: IntCounterVec,
    /// Per-attempt latency.
    pub attempt_duration: Histogram,
    /// Prometheus registry.
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a fresh metrics collector registered against a new registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let attempts_total = register_int_counter_vec!(
            "caller_attempts_total",
            "Total call attempts made through the retryable caller",
            &["provider"]
        )?;
        registry.register(Box::new(attempts_total.clone()))?;

        let retries_total = register_int_counter_vec!(
            "caller_retries_total",
            "Total retries (attempts beyond the first)",
            &["provider"]
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let circuit_open_total = register_int_counter_vec!(
            "caller_circuit_open_total",
            "Total calls rejected by an open circuit",
            &["provider"]
        )?;
        registry.register(Box::new(circuit_open_total.clone()))?;

        let attempt_duration = register_histogram!(
            "caller_attempt_duration_seconds",
            "Histogram of per-attempt call latencies",
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        )?;
        registry.register(Box::new(attempt_duration.clone()))?;

        Ok(Self {
            attempts_total,
            retries_total,
            circuit_open_total,
            attempt_duration,
            registry,
        })
    }

    /// Record an attempt for `provider`.
    pub fn record_attempt(&self, provider: &str) {
        self.attempts_total.with_label_values(&[provider]).inc();
    }

    /// Record a retry for `provider`.
    pub fn record_retry(&self, provider: &str) {
        self.retries_total.with_label_values(&[provider]).inc();
    }

    /// Record a circuit-open rejection for `provider`.
    pub fn record_circuit_open(&self, provider: &str) {
        self.circuit_open_total.with_label_values(&[provider]).inc();
    }

    /// Record an attempt's wall-clock duration.
    pub fn record_attempt_duration(&self, duration_seconds: f64) {
        self.attempt_duration.observe(duration_seconds);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create retry-caller metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_per_provider_attempts() {
        let metrics = Metrics::new().unwrap();
        metrics.record_attempt("stripe");
        metrics.record_attempt("stripe");
        metrics.record_attempt("base-rpc");
        assert_eq!(metrics.attempts_total.with_label_values(&["stripe"]).get(), 2);
        assert_eq!(metrics.attempts_total.with_label_values(&["base-rpc"]).get(), 1);
    }
}
