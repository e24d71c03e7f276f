//! Circuit breaker, keyed per named provider

use crate::config::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Rejecting calls until the timeout elapses.
    Open,
    /// A single probe call is admitted.
    HalfOpen,
}

/// Per-provider failure/success tracking and state transitions.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    last_state_change: DateTime<Utc>,
    config: CircuitBreakerConfig,
}

/// Outcome of a gate check: either the call may proceed, or it is
/// rejected with the number of seconds until the next probe.
pub enum Admission {
    /// The call may proceed.
    Allowed,
    /// The circuit is open; retry after this many seconds.
    Rejected { retry_after_secs: u64 },
}

impl CircuitBreaker {
    /// Create a new breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_at: None,
            last_state_change: Utc::now(),
            config,
        }
    }

    /// Check whether a call may proceed, transitioning `Open → HalfOpen`
    /// if the timeout has elapsed.
    pub fn admit(&mut self, provider: &str) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::HalfOpen => Admission::Allowed,
            CircuitState::Open => {
                let elapsed = self
                    .last_failure_at
                    .map(|t| Utc::now().signed_duration_since(t).num_seconds().max(0) as u64)
                    .unwrap_or(0);
                if elapsed >= self.config.timeout_seconds {
                    info!(provider, "circuit half-opening");
                    self.state = CircuitState::HalfOpen;
                    self.success_count = 0;
                    self.last_state_change = Utc::now();
                    Admission::Allowed
                } else {
                    Admission::Rejected {
                        retry_after_secs: self.config.timeout_seconds - elapsed,
                    }
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&mut self, provider: &str) {
        match self.state {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    info!(provider, "circuit closing");
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                    self.last_state_change = Utc::now();
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&mut self, provider: &str) {
        self.failure_count += 1;
        self.last_failure_at = Some(Utc::now());

        match self.state {
            CircuitState::Closed => {
                if self.failure_count >= self.config.failure_threshold {
                    warn!(provider, failures = self.failure_count, "circuit opening");
                    self.state = CircuitState::Open;
                    self.last_state_change = Utc::now();
                }
            }
            CircuitState::HalfOpen => {
                warn!(provider, "probe failed, circuit re-opening");
                self.state = CircuitState::Open;
                self.success_count = 0;
                self.last_state_change = Utc::now();
            }
            CircuitState::Open => {}
        }
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    fn reset(&mut self, provider: &str) {
        info!(provider, "circuit manually reset");
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.last_failure_at = None;
        self.last_state_change = Utc::now();
    }
}

/// One circuit breaker per named provider, shared across callers.
#[derive(Debug, Clone)]
pub struct CircuitBreakerManager {
    breakers: Arc<DashMap<String, CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    /// Create a manager applying `default_config` to every new provider.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Arc::new(DashMap::new()),
            default_config,
        }
    }

    /// Check admission for `provider`, creating its breaker on first use.
    pub fn admit(&self, provider: &str) -> Admission {
        let mut entry = self
            .breakers
            .entry(provider.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.default_config.clone()));
        entry.admit(provider)
    }

    /// Record a success for `provider`.
    pub fn record_success(&self, provider: &str) {
        if let Some(mut breaker) = self.breakers.get_mut(provider) {
            breaker.record_success(provider);
        }
    }

    /// Record a failure for `provider`.
    pub fn record_failure(&self, provider: &str) {
        if let Some(mut breaker) = self.breakers.get_mut(provider) {
            breaker.record_failure(provider);
        }
    }

    /// Current state for `provider`; `Closed` if it has never been used.
    pub fn state(&self, provider: &str) -> CircuitState {
        self.breakers
            .get(provider)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Manually reset `provider`'s breaker to closed.
    pub fn reset(&self, provider: &str) {
        if let Some(mut breaker) = self.breakers.get_mut(provider) {
            breaker.reset(provider);
        }
    }
}
