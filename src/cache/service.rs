//! Cache Service
//!
//! Namespaced, serialized access to a [`KeyValueStore`] plus compute-or-fetch,
//! pattern invalidation, stats and warm-up.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{validate_ttl, CacheKey, CachePrefix, TtlClass};
use crate::error::{HubError, Result};
use crate::invalidation::{CacheInvalidationPolicy, ResourceKind};
use crate::store::{KeyTtl, KeyValueStore};

// == Options ==
/// Per-call namespace and lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub prefix: CachePrefix,
    /// Seconds; 0 stores without expiry
    pub ttl_secs: u64,
}

impl CacheOptions {
    /// Options under `prefix` with the MEDIUM lifetime.
    pub fn new(prefix: CachePrefix) -> Self {
        Self {
            prefix,
            ttl_secs: TtlClass::Medium.seconds(),
        }
    }

    pub fn ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn ttl_class(mut self, class: TtlClass) -> Self {
        self.ttl_secs = class.seconds();
        self
    }
}

// == Stats Report ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreConnectivity {
    pub connected: bool,
    /// Probe round trip in ms, when connected
    pub latency: Option<u64>,
    pub backend: &'static str,
}

/// Store health joined with the static prefix and TTL catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatsReport {
    pub redis: StoreConnectivity,
    #[serde(rename = "cacheKeys")]
    pub cache_keys: BTreeMap<&'static str, &'static str>,
    #[serde(rename = "cacheTTL")]
    pub cache_ttl: BTreeMap<&'static str, u64>,
}

// == Warm-Up ==
/// One hot entry to preload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmEntry {
    pub prefix: CachePrefix,
    pub key: String,
    pub value: serde_json::Value,
    pub ttl_secs: u64,
}

/// Supplies hot entries for a tenant scope; implemented by the persistence
/// layer.
#[async_trait]
pub trait WarmUpSource: Send + Sync {
    async fn hot_entries(&self, scope_id: &str) -> anyhow::Result<Vec<WarmEntry>>;
}

// == In-Flight Gates ==
/// Per-key async gates used by the coalescing compute-or-fetch.
#[derive(Debug, Default)]
struct InFlight {
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InFlight {
    /// Joins the gate for `key`. The gate is released when the guard drops,
    /// including when the caller is cancelled mid-fetch.
    fn enter<'a>(&'a self, key: &'a str) -> GateGuard<'a> {
        let gate = self
            .gates
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        GateGuard {
            in_flight: self,
            key,
            gate,
        }
    }

    /// Drops the gate once no other caller holds it.
    fn release(&self, key: &str, gate: &Arc<tokio::sync::Mutex<()>>) {
        let mut gates = self.gates.lock();
        // One reference in the map, one in the releasing guard
        let idle = gates
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, gate) && Arc::strong_count(gate) <= 2);
        if idle {
            gates.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.gates.lock().len()
    }
}

struct GateGuard<'a> {
    in_flight: &'a InFlight,
    key: &'a str,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.release(self.key, &self.gate);
    }
}

// == Cache Service ==
pub struct CacheService {
    store: Arc<dyn KeyValueStore>,
    in_flight: InFlight,
}

impl CacheService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            in_flight: InFlight::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // == Get ==
    /// Cached value under `prefix:key`, or `None` on miss, outage or a value
    /// that no longer decodes as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, prefix: CachePrefix) -> Result<Option<T>> {
        let key = CacheKey::new(prefix, key)?;
        Ok(self.read(&key).await)
    }

    // == Set ==
    /// Stores `value`. `Ok(false)` means the store or the encoder refused it;
    /// `Err` is reserved for invalid keys and out-of-range TTLs.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: CacheOptions) -> Result<bool> {
        let key = CacheKey::new(options.prefix, key)?;
        let ttl_secs = validate_ttl(options.ttl_secs)?;
        Ok(self.write(&key, value, ttl_secs).await)
    }

    pub async fn delete(&self, key: &str, prefix: CachePrefix) -> Result<bool> {
        let key = CacheKey::new(prefix, key)?;
        Ok(self.store.del(key.as_str()).await)
    }

    pub async fn exists(&self, key: &str, prefix: CachePrefix) -> Result<bool> {
        let key = CacheKey::new(prefix, key)?;
        Ok(self.store.exists(key.as_str()).await)
    }

    pub async fn ttl(&self, key: &str, prefix: CachePrefix) -> Result<Option<KeyTtl>> {
        let key = CacheKey::new(prefix, key)?;
        Ok(self.store.ttl(key.as_str()).await)
    }

    // == Get Or Set ==
    /// Returns the cached value, or runs `fetch` once, stores its result and
    /// returns it. A fetch error is returned as-is and nothing is stored.
    ///
    /// Concurrent first calls on the same key may each run `fetch`; use
    /// [`CacheService::get_or_set_coalesced`] when that matters.
    pub async fn get_or_set<T, E, F, Fut>(&self, key: &str, options: CacheOptions, fetch: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<HubError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let key = CacheKey::new(options.prefix, key)?;
        let ttl_secs = validate_ttl(options.ttl_secs)?;
        if let Some(cached) = self.read(&key).await {
            debug!(key = %key, "getOrSet hit");
            return Ok(cached);
        }

        let value = fetch().await?;
        self.write(&key, &value, ttl_secs).await;
        Ok(value)
    }

    /// Like [`CacheService::get_or_set`], but concurrent callers of the same
    /// key wait on one in-flight fetch instead of each running their own.
    pub async fn get_or_set_coalesced<T, E, F, Fut>(
        &self,
        key: &str,
        options: CacheOptions,
        fetch: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<HubError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let key = CacheKey::new(options.prefix, key)?;
        let ttl_secs = validate_ttl(options.ttl_secs)?;
        if let Some(cached) = self.read(&key).await {
            return Ok(cached);
        }

        let guard = self.in_flight.enter(key.as_str());
        let _turn = guard.gate.lock().await;
        if let Some(cached) = self.read(&key).await {
            return Ok(cached);
        }

        let value = fetch().await?;
        self.write(&key, &value, ttl_secs).await;
        Ok(value)
    }

    // == Invalidation ==
    /// Deletes every key matching `pattern`. Returns the count.
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        if pattern.trim().is_empty() {
            return Err(HubError::InvalidRequest("pattern cannot be empty".to_string()));
        }
        let deleted = self.store.del_pattern(pattern).await;
        debug!(pattern = %pattern, deleted, "Invalidated pattern");
        Ok(deleted)
    }

    /// Applies the invalidation policy for a write to `resource`.
    /// Returns the patterns used and the total deleted count.
    pub async fn invalidate(&self, resource: ResourceKind, scope_id: Option<&str>) -> (Vec<String>, usize) {
        let patterns = CacheInvalidationPolicy::patterns_for(resource, scope_id);
        let mut deleted = 0;
        for pattern in &patterns {
            deleted += self.store.del_pattern(pattern).await;
        }
        info!(resource = ?resource, scope = ?scope_id, deleted, "Cache invalidated after write");
        (patterns, deleted)
    }

    // == Stats ==
    pub async fn get_cache_stats(&self) -> CacheStatsReport {
        let health = self.store.health_check().await;
        let connected = health.is_healthy();

        CacheStatsReport {
            redis: StoreConnectivity {
                connected,
                latency: health.latency_ms.filter(|_| connected),
                backend: self.store.backend_name(),
            },
            cache_keys: CachePrefix::ALL
                .iter()
                .map(|p| (p.name(), p.as_str()))
                .collect(),
            cache_ttl: TtlClass::ALL
                .iter()
                .map(|c| (c.name(), c.seconds()))
                .collect(),
        }
    }

    // == Warm-Up ==
    /// Preloads the hot entries `source` reports for `scope_id`.
    /// Best-effort: failures are logged and the count of stored entries is
    /// returned.
    pub async fn warm_up_cache(&self, scope_id: &str, source: &dyn WarmUpSource) -> usize {
        let entries = match source.hot_entries(scope_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(scope = %scope_id, error = %e, "Cache warm-up source failed");
                return 0;
            }
        };

        let mut stored = 0;
        for entry in entries {
            match self
                .set(&entry.key, &entry.value, CacheOptions::new(entry.prefix).ttl(entry.ttl_secs))
                .await
            {
                Ok(true) => stored += 1,
                Ok(false) => warn!(scope = %scope_id, key = %entry.key, "Warm-up write refused"),
                Err(e) => warn!(scope = %scope_id, error = %e, "Warm-up entry skipped"),
            }
        }

        info!(scope = %scope_id, stored, "Cache warm-up finished");
        stored
    }

    // == Internal ==
    async fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = self.store.get(key.as_str()).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value failed to decode, treating as miss");
                None
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T, ttl_secs: u64) -> bool {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "Value failed to serialize, not cached");
                return false;
            }
        };
        self.store.set(key.as_str(), encoded, ttl_secs).await
    }
}
