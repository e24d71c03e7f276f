//! Sliding-window nonce dedup
//!
//! Every accepted nonce is remembered until it ages out of the
//! configured window, at which point it becomes eligible for GC on the
//! next `check_and_record` call — the same expired-entry-reclaim
//! discipline the ledger engine's lock manager uses for stale locks.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;

/// Tracks recently-seen nonces to reject replays.
pub struct NonceWindow {
    seen: DashMap<String, DateTime<Utc>>,
    window: ChronoDuration,
}

impl NonceWindow {
    /// Create a window rejecting nonces seen again within `window_seconds`.
    pub fn new(window_seconds: i64) -> Self {
        Self {
            seen: DashMap::new(),
            window: ChronoDuration::seconds(window_seconds),
        }
    }

    /// Record `nonce` if unseen within the window; returns `false` if it
    /// is a replay.
    pub fn check_and_record(&self, nonce: &str) -> bool {
        let now = Utc::now();
        self.sweep(now);

        if self.seen.contains_key(nonce) {
            return false;
        }
        self.seen.insert(nonce.to_string(), now);
        true
    }

    fn sweep(&self, now: DateTime<Utc>) {
        self.seen.retain(|_, seen_at| now.signed_duration_since(*seen_at) < self.window);
    }

    /// Number of nonces currently tracked (for metrics/tests).
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the window is currently empty.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_replayed_nonce() {
        let window = NonceWindow::new(3600);
        assert!(window.check_and_record("n1"));
        assert!(!window.check_and_record("n1"));
    }

    #[test]
    fn sweeps_expired_entries() {
        let window = NonceWindow::new(-1);
        window.check_and_record("n1");
        assert!(window.check_and_record("n1"));
    }
}
