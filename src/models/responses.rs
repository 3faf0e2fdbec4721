//! Response DTOs for the hub API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::CacheStatsReport;
use crate::realtime::DeliveryReport;
use crate::store::{HealthReport, StoreStats};

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Store health result (`healthy`, `disconnected`, `error`)
    pub store: HealthReport,
    pub backend: &'static str,
    /// Live WebSocket sessions
    pub connections: usize,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(store: HealthReport, backend: &'static str, connections: usize) -> Self {
        Self {
            store,
            backend,
            connections,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for GET /cache/stats
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub report: CacheStatsReport,
    /// Backend counters, when the backend keeps them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<CountersResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountersResponse {
    #[serde(flatten)]
    pub stats: StoreStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<StoreStats> for CountersResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for POST /cache/invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub patterns: Vec<String>,
    pub deleted: usize,
}

/// Response body for POST /notifications
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyResponse {
    pub notification_id: String,
    #[serde(flatten)]
    pub report: DeliveryReport,
}

/// Response body for GET /realtime/stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStatsResponse {
    pub connections: usize,
    pub users: usize,
    pub by_role: BTreeMap<&'static str, usize>,
}
