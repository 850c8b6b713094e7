//! Per-triple anomaly suppression.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// TTL map keyed by suppression hash. Acquiring a free key arms its
/// cooldown; acquiring an armed key fails until the TTL lapses.
#[derive(Debug)]
pub struct CooldownCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl CooldownCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// True when the key was free. Arms a fresh TTL for it and drops
    /// expired entries while the lock is held anyway.
    pub async fn acquire(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some(expiry) = entries.get(key) {
            if *expiry > now {
                return false;
            }
        }
        entries.retain(|_, expiry| *expiry > now);
        entries.insert(key.to_string(), now + self.ttl);
        true
    }

    /// Keys currently cooling down.
    pub async fn active_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|expiry| **expiry > now)
            .count()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_is_suppressed_until_the_ttl_lapses() {
        let cache = CooldownCache::new(Duration::from_millis(50));
        assert!(cache.acquire("orders:amount:60").await);
        assert!(!cache.acquire("orders:amount:60").await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.acquire("orders:amount:60").await);
    }

    #[tokio::test]
    async fn keys_cool_down_independently() {
        let cache = CooldownCache::new(Duration::from_millis(50));
        assert!(cache.acquire("orders:amount:60").await);
        assert!(cache.acquire("orders:amount:900").await);
        assert_eq!(cache.active_count().await, 2);
        assert!(!cache.acquire("orders:amount:60").await);
    }

    #[tokio::test]
    async fn expired_entries_are_pruned_on_acquire() {
        let cache = CooldownCache::new(Duration::from_millis(20));
        assert!(cache.acquire("a").await);
        assert!(cache.acquire("b").await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.acquire("c").await);
        // a and b expired and were swept; only c is armed.
        assert_eq!(cache.entries.lock().await.len(), 1);
        assert_eq!(cache.active_count().await, 1);
    }
}
