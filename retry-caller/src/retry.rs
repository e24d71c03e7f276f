//! Retry with full-jitter backoff, composed with rate limiting and a
//! per-provider circuit breaker.
//!
//! `RetryableCaller::call` is the single suspension point every outbound
//! provider call in this workspace passes through: it awaits a rate
//! limit token, checks the circuit breaker, invokes the operation, and
//! on a retryable failure sleeps a jittered backoff before trying again.

use crate::circuit_breaker::{Admission, CircuitBreakerManager};
use crate::config::CallerConfig;
use crate::error::CallerError;
use crate::metrics::Metrics;
use crate::rate_limiter::TokenBucket;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Statuses the retry policy treats as transient server-side failure,
/// per `spec.md §4.1`.
const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Implemented by an operation's error type so the caller can decide
/// whether a failure is worth retrying.
pub trait RetryableError {
    /// Whether this error is inherently retryable (e.g. a network timeout),
    /// independent of any HTTP status code.
    fn is_retryable(&self) -> bool;

    /// HTTP status code carried by this error, if any.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Server-provided `Retry-After` seconds, if any (only meaningful on 429).
    fn retry_after_secs(&self) -> Option<u64> {
        None
    }
}

impl RetryableError for ports::error::PortError {
    fn is_retryable(&self) -> bool {
        ports::error::PortError::is_retryable(self)
    }
}

fn should_retry<E: RetryableError>(err: &E) -> bool {
    if err.is_retryable() {
        return true;
    }
    matches!(err.status_code(), Some(code) if RETRYABLE_STATUS_CODES.contains(&code))
}

/// Compute the full-jitter backoff delay for `attempt` (0-indexed),
/// honoring a server's `Retry-After` floor when present.
fn backoff_delay(config: &CallerConfig, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let exp = config.retry.initial_delay_ms as f64 * config.retry.base.powi(attempt as i32);
    let capped = exp.min(config.retry.max_delay_ms as f64);
    let jitter = 0.5 + rand::thread_rng().gen_range(0.0..0.5);
    let computed_ms = (capped * jitter) as u64;

    match retry_after_secs {
        Some(secs) => Duration::from_millis(computed_ms.max(secs * 1000)),
        None => Duration::from_millis(computed_ms),
    }
}

/// Wraps an async operation with rate limiting, retry, and a circuit
/// breaker, all keyed per named provider.
#[derive(Clone)]
pub struct RetryableCaller {
    config: CallerConfig,
    buckets: Arc<dashmap::DashMap<String, TokenBucket>>,
    breakers: CircuitBreakerManager,
    metrics: Arc<Metrics>,
}

impl RetryableCaller {
    /// Build a caller from `config`, sharing one circuit breaker manager
    /// and metrics collector across every provider it is used with.
    pub fn new(config: CallerConfig) -> Self {
        let breakers = CircuitBreakerManager::new(config.circuit_breaker.clone());
        Self {
            config,
            buckets: Arc::new(dashmap::DashMap::new()),
            breakers,
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Current circuit state for `provider` (for health checks / dashboards).
    pub fn circuit_state(&self, provider: &str) -> crate::circuit_breaker::CircuitState {
        self.breakers.state(provider)
    }

    fn bucket_for(&self, provider: &str) -> TokenBucket {
        self.buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.rate_limit.clone()))
            .clone()
    }

    /// Call `op` under rate limiting, circuit breaking, and retry.
    ///
    /// `op` is re-invoked on each attempt, since most async operations
    /// (HTTP requests, RPC calls) cannot be replayed from a single future.
    pub async fn call<T, E, F, Fut>(
        &self,
        provider: &str,
        mut op: F,
    ) -> Result<T, CallerError<E>>
    where
        E: RetryableError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.breakers.admit(provider) {
            Admission::Allowed => {}
            Admission::Rejected { retry_after_secs } => {
                self.metrics.record_circuit_open(provider);
                return Err(CallerError::CircuitOpen {
                    provider: provider.to_string(),
                    retry_after_secs,
                });
            }
        }

        let bucket = self.bucket_for(provider);
        let mut last_err = None;

        for attempt in 0..=self.config.retry.max_retries {
            bucket.acquire().await;
            self.metrics.record_attempt(provider);
            if attempt > 0 {
                self.metrics.record_retry(provider);
            }

            let started = Instant::now();
            let result = op().await;
            self.metrics
                .record_attempt_duration(started.elapsed().as_secs_f64());

            match result {
                Ok(value) => {
                    self.breakers.record_success(provider);
                    return Ok(value);
                }
                Err(err) => {
                    self.breakers.record_failure(provider);
                    let retryable = should_retry(&err);
                    let retry_after = err.retry_after_secs();

                    if !retryable || attempt == self.config.retry.max_retries {
                        last_err = Some(err);
                        break;
                    }

                    let delay = backoff_delay(&self.config, attempt, retry_after);
                    warn!(
                        provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last_err = Some(err);
                }
            }
        }

        let attempts = self.config.retry.max_retries + 1;
        Err(CallerError::RetriesExhausted {
            provider: provider.to_string(),
            attempts,
            last: last_err.expect("loop always assigns last_err before exiting"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FakeError {
        retryable: bool,
        status: Option<u16>,
    }

    impl RetryableError for FakeError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
        fn status_code(&self) -> Option<u16> {
            self.status
        }
    }

    fn fast_config() -> CallerConfig {
        CallerConfig {
            retry: crate::config::RetryConfig {
                max_retries: 2,
                initial_delay_ms: 1,
                base: 2.0,
                max_delay_ms: 10,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let caller = RetryableCaller::new(fast_config());
        let result: Result<u32, CallerError<FakeError>> =
            caller.call("test-provider", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let caller = RetryableCaller::new(fast_config());
        let attempts = AtomicU32::new(0);

        let result = caller
            .call("test-provider", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(FakeError { retryable: true, status: Some(503) })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_on_non_retryable_error() {
        let caller = RetryableCaller::new(fast_config());
        let attempts = AtomicU32::new(0);

        let result: Result<(), CallerError<FakeError>> = caller
            .call("test-provider", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError { retryable: false, status: Some(400) }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn circuit_opens_after_repeated_failures() {
        let mut config = fast_config();
        config.circuit_breaker.failure_threshold = 2;
        config.circuit_breaker.timeout_seconds = 60;
        let caller = RetryableCaller::new(config);

        for _ in 0..2 {
            let _: Result<(), CallerError<FakeError>> = caller
                .call("flaky", || async {
                    Err(FakeError { retryable: false, status: Some(500) })
                })
                .await;
        }

        let result: Result<(), CallerError<FakeError>> =
            caller.call("flaky", || async { Ok(()) }).await;
        assert!(matches!(result, Err(CallerError::CircuitOpen { .. })));
    }
}
