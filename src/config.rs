//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::realtime::SessionSettings;
use crate::store::RedisSettings;

/// Which key-value backend the cache runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "redis" => Ok(CacheBackendKind::Redis),
            other => Err(format!("unknown cache backend '{other}'")),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    pub cache_backend: CacheBackendKind,
    pub redis_url: String,
    pub redis_pool_size: usize,
    /// Per-command timeout for the Redis backend, in milliseconds
    pub redis_timeout_ms: u64,
    pub health_check_timeout_ms: u64,
    /// Capacity of the in-memory backend
    pub max_entries: usize,
    /// Expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Seconds a WebSocket may stay open without authenticating
    pub auth_timeout_secs: u64,
    pub allow_client_dispatch: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_BACKEND` - `memory` or `redis` (default: memory)
    /// - `REDIS_URL` - Redis connection URL (default: redis://127.0.0.1:6379)
    /// - `REDIS_POOL_SIZE` - Pooled connections (default: 16)
    /// - `REDIS_TIMEOUT_MS` - Command timeout (default: 500)
    /// - `HEALTH_CHECK_TIMEOUT_MS` - PING timeout (default: 1000)
    /// - `MAX_ENTRIES` - Memory backend capacity (default: 10000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `AUTH_TIMEOUT_SECS` - WebSocket auth deadline (default: 10)
    /// - `ALLOW_CLIENT_DISPATCH` - Honour `send_notification` (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source. Unparsable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |name: &str| lookup(name).map(|v| v.trim().to_string());

        Self {
            server_port: parsed(parse("SERVER_PORT"), defaults.server_port),
            cache_backend: parsed(parse("CACHE_BACKEND"), defaults.cache_backend),
            redis_url: parse("REDIS_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.redis_url),
            redis_pool_size: parsed(parse("REDIS_POOL_SIZE"), defaults.redis_pool_size),
            redis_timeout_ms: parsed(parse("REDIS_TIMEOUT_MS"), defaults.redis_timeout_ms),
            health_check_timeout_ms: parsed(
                parse("HEALTH_CHECK_TIMEOUT_MS"),
                defaults.health_check_timeout_ms,
            ),
            max_entries: parsed(parse("MAX_ENTRIES"), defaults.max_entries),
            cleanup_interval: parsed(parse("CLEANUP_INTERVAL"), defaults.cleanup_interval),
            auth_timeout_secs: parsed(parse("AUTH_TIMEOUT_SECS"), defaults.auth_timeout_secs),
            allow_client_dispatch: parsed(
                parse("ALLOW_CLIENT_DISPATCH"),
                defaults.allow_client_dispatch,
            ),
        }
    }

    pub fn redis_settings(&self) -> RedisSettings {
        RedisSettings {
            url: self.redis_url.clone(),
            pool_size: self.redis_pool_size.max(1),
            op_timeout: Duration::from_millis(self.redis_timeout_ms),
            health_timeout: Duration::from_millis(self.health_check_timeout_ms),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            auth_timeout: Duration::from_secs(self.auth_timeout_secs),
            allow_client_dispatch: self.allow_client_dispatch,
        }
    }
}

fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_backend: CacheBackendKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            redis_pool_size: 16,
            redis_timeout_ms: 500,
            health_check_timeout_ms: 1000,
            max_entries: 10_000,
            cleanup_interval: 1,
            auth_timeout_secs: 10,
            allow_client_dispatch: true,
        }
    }
}
