//! Configuration for retry, rate-limit, and circuit-breaker behavior

use serde::{Deserialize, Serialize};

/// Default number of retry attempts beyond the first.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default failure threshold before the circuit opens.
pub const DEFAULT_CB_FAILURE_THRESHOLD: u32 = 5;
/// Default seconds the circuit stays open before probing.
pub const DEFAULT_CB_TIMEOUT_SECONDS: u64 = 60;

/// Retry policy: bounded attempts with full-jitter exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Initial delay, in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplicative base for exponential backoff.
    pub base: f64,
    /// Ceiling on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: 200,
            base: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

/// Token-bucket rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity (maximum burst).
    pub burst: u32,
    /// Sustained refill rate, in tokens per second.
    pub rps: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { burst: 20, rps: 10.0 }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before a half-open probe is admitted.
    pub timeout_seconds: u64,
    /// Consecutive successes in half-open before the circuit closes.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CB_FAILURE_THRESHOLD,
            timeout_seconds: DEFAULT_CB_TIMEOUT_SECONDS,
            success_threshold: 2,
        }
    }
}

/// Top-level configuration for a `RetryableCaller`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallerConfig {
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl CallerConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, crate::error::CallerError<std::io::Error>> {
        let contents = std::fs::read_to_string(path).map_err(crate::error::CallerError::Inner)?;
        toml::from_str(&contents).map_err(|e| {
            crate::error::CallerError::Inner(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}
