//! Behaviour with an unreachable Redis.
//!
//! Every operation must come back with its sentinel value (miss, `false`,
//! zero) well inside the operation timeout, and nothing may panic.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dept_hub::{
    api::create_router,
    cache::{CacheOptions, CachePrefix, CacheService},
    invalidation::ResourceKind,
    realtime::SessionSettings,
    store::{HealthStatus, KeyValueStore, RedisSettings, RedisStore},
    AppState, HubError,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn unreachable_settings() -> RedisSettings {
    RedisSettings {
        url: "redis://127.0.0.1:1".to_string(),
        pool_size: 2,
        op_timeout: Duration::from_millis(300),
        health_timeout: Duration::from_millis(300),
    }
}

fn unreachable_store() -> Arc<dyn KeyValueStore> {
    Arc::new(RedisStore::connect(&unreachable_settings()).unwrap())
}

#[tokio::test]
async fn test_raw_operations_degrade_to_sentinels() {
    let store = unreachable_store();
    let started = Instant::now();

    assert_eq!(store.get("students:1").await, None);
    assert!(!store.set("students:1", "1".to_string(), 60).await);
    assert!(!store.del("students:1").await);
    assert!(!store.exists("students:1").await);
    assert_eq!(store.ttl("students:1").await, None);
    assert_eq!(store.del_pattern("students:*").await, 0);
    assert!(!store.flush_all().await);
    assert_eq!(store.purge_expired().await, 0);
    assert!(store.counters().await.is_none());

    // Eight operations, each bounded by the 300ms budget
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_health_reports_outage() {
    let store = unreachable_store();
    let report = store.health_check().await;
    assert_ne!(report.status, HealthStatus::Healthy);
    assert!(report.latency_ms.is_none());
}

#[tokio::test]
async fn test_cache_service_serves_through_outage() {
    let cache = CacheService::new(unreachable_store());
    let options = CacheOptions::new(CachePrefix::Student).ttl(300);

    let got: Option<Value> = cache.get("user:42", CachePrefix::Student).await.unwrap();
    assert!(got.is_none());
    assert!(!cache.set("user:42", &json!({"name": "Amit"}), options).await.unwrap());

    // The fetch result still reaches the caller
    let value: Value = cache
        .get_or_set("user:42", options, || async { Ok::<_, HubError>(json!({"name": "Amit"})) })
        .await
        .unwrap();
    assert_eq!(value["name"], "Amit");

    assert_eq!(cache.invalidate_pattern("students:*").await.unwrap(), 0);
    let (patterns, deleted) = cache.invalidate(ResourceKind::Marks, Some("dept-3")).await;
    assert!(!patterns.is_empty());
    assert_eq!(deleted, 0);

    let stats = cache.get_cache_stats().await;
    assert!(!stats.redis.connected);
    assert!(stats.redis.latency.is_none());
    assert_eq!(stats.redis.backend, "redis");
}

#[tokio::test]
async fn test_invalid_keys_still_rejected_during_outage() {
    let cache = CacheService::new(unreachable_store());
    let result: Result<Option<Value>, HubError> = cache.get("has space", CachePrefix::Course).await;
    assert!(matches!(result, Err(HubError::InvalidKey(_))));
}

#[tokio::test]
async fn test_health_endpoint_stays_up() {
    let state = AppState::new(unreachable_store(), SessionSettings::default());
    let app = create_router(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["backend"], "redis");
    assert_ne!(json["store"]["status"], "healthy");
}
