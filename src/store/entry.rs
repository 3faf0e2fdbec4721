//! Cache Entry Module
//!
//! A stored value plus the instants that govern its logical lifetime.

// == Cache Entry ==
/// A single stored value with creation and expiry instants (Unix ms).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized value
    pub value: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry at `now_ms`. A `ttl_secs` of 0 never expires.
    pub fn new(value: String, ttl_secs: u64, now_ms: u64) -> Self {
        let expires_at = (ttl_secs > 0).then(|| now_ms.saturating_add(ttl_secs.saturating_mul(1000)));

        Self {
            value,
            created_at: now_ms,
            expires_at,
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now_ms` reaches its expiry instant.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Remaining lifetime in whole seconds, rounded up.
    ///
    /// - `None` if the entry never expires
    /// - `Some(0)` once expired
    pub fn ttl_remaining_secs(&self, now_ms: u64) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(now_ms).div_ceil(1000))
    }
}
