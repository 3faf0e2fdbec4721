//! Dept Hub - cache and real-time notification core
//!
//! Namespaced TTL caching with write-triggered invalidation over a pluggable
//! key-value store, plus per-user and per-role notification fan-out to live
//! WebSocket sessions.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod models;
pub mod realtime;
pub mod store;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheOptions, CachePrefix, CacheService, TtlClass};
pub use config::Config;
pub use error::{HubError, Result};
pub use invalidation::{CacheInvalidationPolicy, ResourceKind};
pub use realtime::{ConnectionRegistry, NotificationDispatcher, NotificationPayload};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
pub use tasks::spawn_cleanup_task;
