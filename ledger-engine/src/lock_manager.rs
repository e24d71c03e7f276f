//! Per-resource exclusive locking (`spec.md §5`)
//!
//! Single-account writes acquire one lock; batches acquire every
//! account's lock up front, sorted by `(resource_type, resource_id)`,
//! which makes two overlapping batches deadlock-free regardless of
//! submission order. Locks are reentrant for their holder and
//! reclaimed if they outlive their TTL without being released.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
struct LockRecord {
    holder_id: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    depth: u32,
}

/// Identifies a lockable resource, e.g. `("account", "sub_agent-42")`.
pub type ResourceKey = (String, String);

/// Tracks held locks and grants/releases them, reentrant per holder.
pub struct LockManager {
    locks: DashMap<ResourceKey, LockRecord>,
    default_ttl_ms: u64,
}

impl LockManager {
    /// Create a manager whose locks expire after `default_ttl_ms` unless released.
    pub fn new(default_ttl_ms: u64) -> Self {
        Self {
            locks: DashMap::new(),
            default_ttl_ms,
        }
    }

    fn reclaim_if_expired(&self, key: &ResourceKey) {
        let now = Utc::now();
        let expired = self
            .locks
            .get(key)
            .map(|r| r.expires_at < now)
            .unwrap_or(false);
        if expired {
            self.locks.remove(key);
        }
    }

    /// Acquire a single lock, polling until `timeout` elapses. Reentrant:
    /// a second acquire by the same `holder_id` extends the expiry and
    /// increments a depth counter instead of blocking.
    pub async fn acquire(&self, key: ResourceKey, holder_id: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.reclaim_if_expired(&key);

            let now = Utc::now();
            let expires_at = now + chrono::Duration::milliseconds(self.default_ttl_ms as i64);

            let granted = {
                let mut entry = self.locks.entry(key.clone());
                match &mut entry {
                    dashmap::mapref::entry::Entry::Vacant(vacant) => {
                        vacant.insert(LockRecord {
                            holder_id: holder_id.to_string(),
                            acquired_at: now,
                            expires_at,
                            depth: 1,
                        });
                        true
                    }
                    dashmap::mapref::entry::Entry::Occupied(occupied) => {
                        if occupied.get().holder_id == holder_id {
                            let record = occupied.into_mut();
                            record.depth += 1;
                            record.expires_at = expires_at;
                            true
                        } else {
                            false
                        }
                    }
                }
            };

            if granted {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::LockTimeout {
                    resource: format!("{}:{}", key.0, key.1),
                });
            }
            sleep(Duration::from_millis(5)).await;
        }
    }

    /// Acquire every key in `keys`, sorted first, so that two callers
    /// contending on overlapping sets always acquire in the same order.
    pub async fn acquire_sorted(
        &self,
        mut keys: Vec<ResourceKey>,
        holder_id: &str,
        timeout: Duration,
    ) -> Result<Vec<ResourceKey>> {
        keys.sort();
        keys.dedup();

        for (i, key) in keys.iter().enumerate() {
            if let Err(err) = self.acquire(key.clone(), holder_id, timeout).await {
                for acquired in keys[..i].iter().rev() {
                    self.release(acquired.clone(), holder_id);
                }
                return Err(err);
            }
        }
        Ok(keys)
    }

    /// Release one level of a reentrant lock; fully releases at depth 0.
    pub fn release(&self, key: ResourceKey, holder_id: &str) {
        let should_remove = match self.locks.get_mut(&key) {
            Some(mut record) if record.holder_id == holder_id => {
                record.depth = record.depth.saturating_sub(1);
                record.depth == 0
            }
            _ => false,
        };
        if should_remove {
            self.locks.remove(&key);
        }
    }

    /// Release every key in `keys`, in reverse acquisition order.
    pub fn release_all(&self, keys: &[ResourceKey], holder_id: &str) {
        for key in keys.iter().rev() {
            self.release(key.clone(), holder_id);
        }
    }

    /// Whether `key` is currently held (for tests/diagnostics).
    pub fn is_held(&self, key: &ResourceKey) -> bool {
        self.reclaim_if_expired(key);
        self.locks.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(id: &str) -> ResourceKey {
        ("account".to_string(), id.to_string())
    }

    #[tokio::test]
    async fn reentrant_acquire_by_same_holder_succeeds() {
        let manager = LockManager::new(30_000);
        manager.acquire(acc("a1"), "holder-1", Duration::from_millis(100)).await.unwrap();
        manager.acquire(acc("a1"), "holder-1", Duration::from_millis(100)).await.unwrap();
        assert!(manager.is_held(&acc("a1")));
        manager.release(acc("a1"), "holder-1");
        assert!(manager.is_held(&acc("a1")));
        manager.release(acc("a1"), "holder-1");
        assert!(!manager.is_held(&acc("a1")));
    }

    #[tokio::test]
    async fn different_holder_times_out() {
        let manager = LockManager::new(30_000);
        manager.acquire(acc("a1"), "holder-1", Duration::from_millis(100)).await.unwrap();
        let result = manager.acquire(acc("a1"), "holder-2", Duration::from_millis(30)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn expired_lock_is_reclaimed() {
        let manager = LockManager::new(1);
        manager.acquire(acc("a1"), "holder-1", Duration::from_millis(100)).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        manager.acquire(acc("a1"), "holder-2", Duration::from_millis(100)).await.unwrap();
    }

    #[tokio::test]
    async fn sorted_multi_acquire_is_order_independent() {
        let manager = LockManager::new(30_000);
        let keys_a = vec![acc("a2"), acc("a1")];
        let keys_b = vec![acc("a1"), acc("a3")];

        let held_a = manager
            .acquire_sorted(keys_a, "batch-a", Duration::from_millis(50))
            .await
            .unwrap();
        manager.release_all(&held_a, "batch-a");

        let held_b = manager
            .acquire_sorted(keys_b, "batch-b", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(held_b, vec![acc("a1"), acc("a3")]);
        manager.release_all(&held_b, "batch-b");
    }
}
