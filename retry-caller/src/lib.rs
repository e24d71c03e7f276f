//! Retry, rate-limit, and circuit-breaker wrapper for outbound calls to
//! external providers (chain RPCs, compliance vendors, the fiat
//! treasury, KYC/sanctions vendors).
//!
//! Every call to a port implementation funnels through
//! [`RetryableCaller::call`], which is the one place suspension across
//! a rate-limit wait, a retry delay, or the inner call itself happens.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{CircuitBreakerManager, CircuitState};
pub use config::{CallerConfig, CircuitBreakerConfig, RateLimitConfig, RetryConfig};
pub use error::CallerError;
pub use metrics::Metrics;
pub use rate_limiter::TokenBucket;
pub use retry::{RetryableCaller, RetryableError};
