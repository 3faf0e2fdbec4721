//! Redis backend over a `deadpool-redis` pool.
//!
//! Every command runs under a fixed timeout. Pool, command and timeout
//! failures are logged and mapped to the degraded sentinel of the operation.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolConfig, Runtime, Timeouts};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{HubError, Result};
use crate::store::{HealthReport, KeyTtl, KeyValueStore};

/// Keys fetched per `SCAN` round trip during pattern deletes.
const SCAN_BATCH: usize = 200;

// == Settings ==
/// Connection parameters for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
    pub pool_size: usize,
    /// Budget for a single command, pool wait included
    pub op_timeout: Duration,
    /// Budget for `PING` in health checks
    pub health_timeout: Duration,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 16,
            op_timeout: Duration::from_millis(500),
            health_timeout: Duration::from_millis(1000),
        }
    }
}

// == Redis Store ==
/// [`KeyValueStore`] backed by an external Redis server.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    op_timeout: Duration,
    health_timeout: Duration,
}

impl RedisStore {
    /// Builds the pool. Connections are opened lazily, so an unreachable
    /// server is not an error here; it shows up as degraded operations.
    pub fn connect(settings: &RedisSettings) -> Result<Self> {
        let mut config = deadpool_redis::Config::from_url(&settings.url);
        let mut pool_config = PoolConfig::new(settings.pool_size.max(1));
        pool_config.timeouts = Timeouts {
            wait: Some(settings.op_timeout),
            create: Some(settings.op_timeout),
            recycle: Some(settings.op_timeout),
        };
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| HubError::StoreUnavailable(e.to_string()))?;

        info!(url = %settings.url, pool_size = settings.pool_size, "Redis pool created");
        Ok(Self {
            pool,
            op_timeout: settings.op_timeout,
            health_timeout: settings.health_timeout,
        })
    }

    /// Runs `op` on a pooled connection under the operation timeout.
    /// Returns `None` on any failure after logging it.
    async fn run<T, F, Fut>(&self, name: &'static str, key: &str, op: F) -> Option<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let attempt = async {
            let conn = self.pool.get().await.map_err(|e| e.to_string())?;
            op(conn).await.map_err(|e| e.to_string())
        };

        match tokio::time::timeout(self.op_timeout, attempt).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                warn!(op = name, key = %key, error = %error, "Redis operation failed");
                None
            }
            Err(_) => {
                warn!(op = name, key = %key, timeout_ms = self.op_timeout.as_millis() as u64, "Redis operation timed out");
                None
            }
        }
    }
}

/// Drives cursor rounds until the cursor wraps to 0 or a round fails.
/// Returns the keys removed by the rounds that completed.
async fn sweep_rounds<F, Fut>(mut round: F) -> usize
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Option<(u64, usize)>>,
{
    let mut cursor: u64 = 0;
    let mut deleted: usize = 0;
    while let Some((next, removed)) = round(cursor).await {
        deleted += removed;
        if next == 0 {
            break;
        }
        cursor = next;
    }
    deleted
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.run("get", key, |mut conn| async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await
        .flatten()
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> bool {
        self.run("set", key, |mut conn| async move {
            if ttl_secs > 0 {
                conn.set_ex::<_, _, ()>(key, value, ttl_secs).await
            } else {
                conn.set::<_, _, ()>(key, value).await
            }
        })
        .await
        .is_some()
    }

    async fn del(&self, key: &str) -> bool {
        self.run("del", key, |mut conn| async move {
            conn.del::<_, usize>(key).await
        })
        .await
        .is_some_and(|removed| removed > 0)
    }

    async fn exists(&self, key: &str) -> bool {
        self.run("exists", key, |mut conn| async move {
            conn.exists::<_, bool>(key).await
        })
        .await
        .unwrap_or(false)
    }

    async fn ttl(&self, key: &str) -> Option<KeyTtl> {
        let raw = self
            .run("ttl", key, |mut conn| async move {
                conn.ttl::<_, i64>(key).await
            })
            .await?;

        match raw {
            -1 => Some(KeyTtl::NoExpiry),
            secs if secs > 0 => Some(KeyTtl::Remaining(secs as u64)),
            // -2 (absent) and 0 (expiring this instant)
            _ => None,
        }
    }

    async fn del_pattern(&self, pattern: &str) -> usize {
        // Each SCAN/DEL round gets its own timeout so a slow round keeps the
        // count of the rounds before it.
        let deleted = sweep_rounds(move |cursor| {
            self.run("del_pattern", pattern, move |mut conn| async move {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;

                let removed = if keys.is_empty() {
                    0
                } else {
                    conn.del::<_, usize>(keys).await?
                };
                Ok::<(u64, usize), redis::RedisError>((next, removed))
            })
        })
        .await;

        debug!(pattern = %pattern, deleted, "Pattern delete");
        deleted
    }

    async fn flush_all(&self) -> bool {
        self.run("flush_all", "*", |mut conn| async move {
            let flushed: redis::RedisResult<()> =
                redis::cmd("FLUSHDB").query_async(&mut conn).await;
            flushed
        })
        .await
        .is_some()
    }

    async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        let ping = async {
            let mut conn = match self.pool.get().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Redis health check could not get a connection");
                    return HealthReport::disconnected();
                }
            };
            let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
            match pong {
                Ok(_) => HealthReport::healthy(started.elapsed().as_millis() as u64),
                Err(e) => {
                    warn!(error = %e, "Redis PING failed");
                    HealthReport::error()
                }
            }
        };

        match tokio::time::timeout(self.health_timeout, ping).await {
            Ok(report) => report,
            Err(_) => {
                warn!(timeout_ms = self.health_timeout.as_millis() as u64, "Redis health check timed out");
                HealthReport::error()
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RedisSettings::default();
        assert_eq!(settings.url, "redis://127.0.0.1:6379");
        assert_eq!(settings.pool_size, 16);
        assert_eq!(settings.op_timeout, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_connect_is_lazy() {
        let settings = RedisSettings {
            url: "redis://127.0.0.1:1".to_string(),
            ..RedisSettings::default()
        };
        let store = RedisStore::connect(&settings).unwrap();
        assert_eq!(store.backend_name(), "redis");
    }

    #[test]
    fn test_connect_rejects_bad_url() {
        let settings = RedisSettings {
            url: "not a url".to_string(),
            ..RedisSettings::default()
        };
        assert!(matches!(
            RedisStore::connect(&settings),
            Err(HubError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_stops_at_cursor_wrap() {
        let mut rounds = vec![(7, 3), (12, 0), (0, 2)].into_iter();
        let mut seen = Vec::new();
        let deleted = sweep_rounds(|cursor| {
            seen.push(cursor);
            let round = rounds.next();
            async move { round }
        })
        .await;

        assert_eq!(deleted, 5);
        assert_eq!(seen, vec![0, 7, 12]);
    }

    #[tokio::test]
    async fn test_sweep_keeps_count_when_a_round_fails() {
        // Third round times out
        let mut rounds = vec![Some((4, 200)), Some((9, 150)), None].into_iter();
        let deleted = sweep_rounds(|_| {
            let round = rounds.next().flatten();
            async move { round }
        })
        .await;

        assert_eq!(deleted, 350);
    }

    #[tokio::test]
    async fn test_del_pattern_unreachable_returns_zero() {
        let settings = RedisSettings {
            url: "redis://127.0.0.1:1".to_string(),
            op_timeout: Duration::from_millis(200),
            ..RedisSettings::default()
        };
        let store = RedisStore::connect(&settings).unwrap();
        assert_eq!(store.del_pattern("students:*").await, 0);
    }
}
