//! API Handlers
//!
//! HTTP request handlers for the monitoring and administrative endpoints,
//! plus the WebSocket upgrade for the real-time channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    Json,
};
use tracing::{info, warn};

use crate::cache::CacheService;
use crate::config::{CacheBackendKind, Config};
use crate::error::{HubError, Result};
use crate::models::{
    CacheStatsResponse, HealthResponse, InvalidateRequest, InvalidateResponse, NotifyRequest,
    NotifyResponse, RealtimeStatsResponse,
};
use crate::realtime::{
    run_session, ConnectionRegistry, NotificationDispatcher, Role, SessionSettings,
};
use crate::store::{KeyValueStore, MemoryStore, RedisStore};

/// Application state shared across all handlers.
///
/// The registry is created here once and shared by `Arc`; the dispatcher
/// and every session hold the same instance.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheService>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: NotificationDispatcher,
    pub session: SessionSettings,
}

impl AppState {
    /// Creates a new AppState over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>, session: SessionSettings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            cache: Arc::new(CacheService::new(store)),
            dispatcher: NotificationDispatcher::new(registry.clone()),
            registry,
            session,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// A Redis pool that cannot be built falls back to the memory backend.
    pub fn from_config(config: &Config) -> Self {
        Self::new(build_store(config), config.session_settings())
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        self.cache.store()
    }
}

fn build_store(config: &Config) -> Arc<dyn KeyValueStore> {
    match config.cache_backend {
        CacheBackendKind::Memory => Arc::new(MemoryStore::new(config.max_entries)),
        CacheBackendKind::Redis => match RedisStore::connect(&config.redis_settings()) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to memory store");
                Arc::new(MemoryStore::new(config.max_entries))
            }
        },
    }
}

/// Handler for GET /health
///
/// Reports store connectivity. Always 200: a degraded store is a state to
/// report, not a failure of this endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.store().health_check().await;
    Json(HealthResponse::new(
        report,
        state.store().backend_name(),
        state.registry.count_connected(),
    ))
}

/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let report = state.cache.get_cache_stats().await;
    let counters = state.store().counters().await.map(Into::into);
    Json(CacheStatsResponse { report, counters })
}

/// Handler for POST /cache/invalidate
///
/// Runs the invalidation policy for a write the caller just committed.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Json<InvalidateResponse> {
    let scope = req.scope_id.as_deref().filter(|s| !s.trim().is_empty());
    let (patterns, deleted) = state.cache.invalidate(req.resource, scope).await;
    Json(InvalidateResponse { patterns, deleted })
}

/// Handler for POST /notifications
pub async fn notify_handler(
    State(state): State<AppState>,
    Json(req): Json<NotifyRequest>,
) -> Result<Json<NotifyResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(HubError::InvalidRequest(error_msg));
    }

    let payload = req.notification.into_payload();
    let report = state.dispatcher.dispatch(&req.audience, &payload);
    info!(
        notification = %payload.id(),
        targeted = report.targeted,
        delivered = report.delivered,
        "Administrative notification dispatched"
    );

    Ok(Json(NotifyResponse {
        notification_id: payload.id().to_string(),
        report,
    }))
}

/// Handler for GET /realtime/stats
pub async fn realtime_stats_handler(State(state): State<AppState>) -> Json<RealtimeStatsResponse> {
    let registry = &state.registry;
    Json(RealtimeStatsResponse {
        connections: registry.count_connected(),
        users: registry.connected_users().len(),
        by_role: Role::ALL
            .iter()
            .map(|role| (role.as_str(), registry.count_by_role(*role)))
            .collect::<BTreeMap<_, _>>(),
    })
}

/// Handler for GET /ws
///
/// Upgrades to the real-time channel.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let dispatcher = state.dispatcher.clone();
    let settings = state.session;
    ws.on_upgrade(move |socket| run_session(socket, dispatcher, settings))
}
