//! Memory Store Module
//!
//! In-process backend: HashMap storage with LRU eviction and logical TTL
//! expiry checked on every read.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::store::{
    glob_match, CacheEntry, Clock, HealthReport, KeyTtl, KeyValueStore, LruTracker, StoreStats,
    SystemClock, MAX_KEY_LENGTH, MAX_VALUE_SIZE,
};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: StoreStats,
}

impl Inner {
    /// Drops `key` if it is expired. Returns `true` if it was dropped.
    fn reap_if_expired(&mut self, key: &str, now: u64) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
        }
        expired
    }

    fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }
}

// == Memory Store ==
/// In-process [`KeyValueStore`].
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    /// Creates a store that reads time from `clock`.
    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    // == Stats ==
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    /// Physically stored entries, including expired ones not yet reclaimed.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.write().await;

        if inner.reap_if_expired(key, now) {
            inner.stats.record_miss();
            return None;
        }

        let value = inner.entries.get(key).map(|entry| entry.value.clone());
        match value {
            Some(value) => {
                inner.stats.record_hit();
                inner.lru.touch(key);
                Some(value)
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> bool {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            warn!(key = %key, "Rejected key outside length bounds");
            return false;
        }
        if value.len() > MAX_VALUE_SIZE {
            warn!(key = %key, size = value.len(), "Rejected oversized value");
            return false;
        }

        let now = self.clock.now_ms();
        let mut inner = self.inner.write().await;

        let is_overwrite = inner.entries.contains_key(key);
        if !is_overwrite && inner.entries.len() >= self.max_entries {
            if let Some(evicted) = inner.lru.evict_oldest() {
                inner.entries.remove(&evicted);
                inner.stats.record_eviction();
                debug!(key = %evicted, "Evicted least recently used entry");
            }
        }

        inner
            .entries
            .insert(key.to_string(), CacheEntry::new(value, ttl_secs, now));
        inner.lru.touch(key);
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
        true
    }

    async fn del(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let mut inner = self.inner.write().await;
        if inner.reap_if_expired(key, now) {
            return false;
        }
        inner.remove(key)
    }

    async fn exists(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let inner = self.inner.read().await;
        inner
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    async fn ttl(&self, key: &str) -> Option<KeyTtl> {
        let now = self.clock.now_ms();
        let inner = self.inner.read().await;
        let entry = inner.entries.get(key)?;
        if entry.is_expired_at(now) {
            return None;
        }
        Some(match entry.ttl_remaining_secs(now) {
            Some(secs) => KeyTtl::Remaining(secs),
            None => KeyTtl::NoExpiry,
        })
    }

    async fn del_pattern(&self, pattern: &str) -> usize {
        let now = self.clock.now_ms();
        let mut inner = self.inner.write().await;

        let matching: Vec<(String, bool)> = inner
            .entries
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, entry)| (key.clone(), entry.is_expired_at(now)))
            .collect();

        let mut deleted = 0;
        let mut expired = 0;
        for (key, is_expired) in matching {
            inner.remove(&key);
            if is_expired {
                expired += 1;
            } else {
                deleted += 1;
            }
        }
        inner.stats.record_expirations(expired);

        debug!(pattern = %pattern, deleted, "Pattern delete");
        deleted
    }

    async fn flush_all(&self) -> bool {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.lru.clear();
        inner.stats.set_total_entries(0);
        true
    }

    async fn health_check(&self) -> HealthReport {
        HealthReport::healthy(0)
    }

    async fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut inner = self.inner.write().await;

        let expired_keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            inner.remove(key);
        }
        inner.stats.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    async fn counters(&self) -> Option<StoreStats> {
        Some(self.stats().await)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
