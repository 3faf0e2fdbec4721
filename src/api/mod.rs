//! API Module
//!
//! HTTP handlers and routing for the hub's monitoring and administrative
//! surface.
//!
//! # Endpoints
//! - `GET /health` - Store health check
//! - `GET /cache/stats` - Cache statistics
//! - `POST /cache/invalidate` - Invalidate after a write
//! - `POST /notifications` - Administrative dispatch
//! - `GET /realtime/stats` - Connection statistics
//! - `GET /ws` - Real-time channel

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
