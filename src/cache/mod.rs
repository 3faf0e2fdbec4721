//! Cache Module
//!
//! Namespaced, TTL-governed caching on top of the key-value store.

mod prefix;
mod service;
mod ttl;


pub use prefix::{CacheKey, CachePrefix, MAX_RAW_KEY_LENGTH};
pub use service::{
    CacheOptions, CacheService, CacheStatsReport, StoreConnectivity, WarmEntry, WarmUpSource,
};
pub use ttl::{validate_ttl, TtlClass, MAX_TTL_SECS};
