//! API Routes
//!
//! Configures the Axum router with the hub endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_stats_handler, health_handler, invalidate_handler, notify_handler,
    realtime_stats_handler, ws_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Store health and live connection count
/// - `GET /cache/stats` - Key catalog, TTL catalog and backend counters
/// - `POST /cache/invalidate` - Apply the invalidation policy for a write
/// - `POST /notifications` - Dispatch a notification to an audience
/// - `GET /realtime/stats` - Live sessions by role
/// - `GET /ws` - Real-time WebSocket channel
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/notifications", post(notify_handler))
        .route("/realtime/stats", get(realtime_stats_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
