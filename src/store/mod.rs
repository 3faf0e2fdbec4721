//! Key-Value Store Module
//!
//! Raw primitives over the external cache service. Every backend degrades to
//! a miss or a `false` when the service cannot be reached, so callers never
//! handle store errors themselves.

mod clock;
mod entry;
mod glob;
mod lru;
mod memory;
mod redis;
mod stats;


use async_trait::async_trait;
use serde::Serialize;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use glob::glob_match;
pub use lru::LruTracker;
pub use memory::MemoryStore;
pub use redis::{RedisSettings, RedisStore};
pub use stats::StoreStats;

// == Public Constants ==
/// Maximum allowed composed key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

/// Maximum allowed serialized value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

// == Health ==
/// Connectivity state reported by [`KeyValueStore::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Disconnected,
    Error,
}

/// Result of a bounded health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl HealthReport {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: HealthStatus::Disconnected,
            latency_ms: None,
        }
    }

    pub fn error() -> Self {
        Self {
            status: HealthStatus::Error,
            latency_ms: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

// == Key TTL ==
/// Remaining lifetime of a live key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyTtl {
    /// Seconds until logical expiry, rounded up so a live key never reports 0
    Remaining(u64),
    /// Key was stored with ttl 0
    NoExpiry,
}

// == Key-Value Store ==
/// Raw operations against the backing cache service.
///
/// Keys passed here are already composed (`prefix:rawKey`). Values are the
/// serialized JSON text produced by the cache service. A `ttl_secs` of 0
/// stores the key without expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the live value, or `None` on miss, expiry or outage.
    async fn get(&self, key: &str) -> Option<String>;

    /// Stores a value. Returns `false` if the store rejected or missed the write.
    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> bool;

    /// Deletes a key. Returns `true` only if a live key was removed.
    async fn del(&self, key: &str) -> bool;

    /// Returns `true` if a live key exists.
    async fn exists(&self, key: &str) -> bool;

    /// Remaining lifetime, or `None` if the key is absent or expired.
    async fn ttl(&self, key: &str) -> Option<KeyTtl>;

    /// Deletes every live key matching a Redis-style glob. Returns the count.
    async fn del_pattern(&self, pattern: &str) -> usize;

    /// Removes every key. Returns `false` on outage.
    async fn flush_all(&self) -> bool;

    /// Bounded connectivity check.
    async fn health_check(&self) -> HealthReport;

    /// Reclaims physically-expired entries. Backends that expire on their
    /// own keep the default.
    async fn purge_expired(&self) -> usize {
        0
    }

    /// Hit/miss/eviction counters, for backends that keep them.
    async fn counters(&self) -> Option<StoreStats> {
        None
    }

    /// Backend label for logs and stats.
    fn backend_name(&self) -> &'static str;
}
