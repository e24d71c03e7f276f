//! Single-writer token bucket rate limiter

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket shared by every caller targeting one provider.
#[derive(Clone)]
pub struct TokenBucket {
    inner: Arc<Mutex<Bucket>>,
    config: RateLimitConfig,
}

impl TokenBucket {
    /// Create a bucket starting full.
    pub fn new(config: RateLimitConfig) -> Self {
        let tokens = config.burst as f64;
        Self {
            inner: Arc::new(Mutex::new(Bucket {
                tokens,
                last_refill: Instant::now(),
            })),
            config,
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.rps).min(self.config.burst as f64);
        bucket.last_refill = now;
    }

    /// Try to take one token immediately; `None` if the bucket is empty,
    /// `Some(wait)` tells the caller how long to sleep before retrying.
    fn try_take(&self) -> Option<Duration> {
        let mut bucket = self.inner.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - bucket.tokens;
            Some(Duration::from_secs_f64(deficit / self.config.rps))
        }
    }

    /// Await a token, sleeping in a loop until one becomes available.
    pub async fn acquire(&self) {
        loop {
            match self.try_take() {
                None => return,
                Some(wait) => sleep(wait).await,
            }
        }
    }
}
