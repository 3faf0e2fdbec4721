//! Symbolic TTL classes.

use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};

/// Longest accepted explicit TTL (one year)
pub const MAX_TTL_SECS: u64 = 365 * 24 * 3_600;

/// Rejects lifetimes no backend can represent. 0 means no expiry.
pub fn validate_ttl(ttl_secs: u64) -> Result<u64> {
    if ttl_secs > MAX_TTL_SECS {
        return Err(HubError::InvalidRequest(format!(
            "ttl {ttl_secs}s exceeds maximum of {MAX_TTL_SECS}s"
        )));
    }
    Ok(ttl_secs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TtlClass {
    /// Personalized or volatile data
    Short,
    /// List and aggregate views
    Medium,
    /// Rarely-changing reference data such as directories
    Long,
}

impl TtlClass {
    pub const ALL: [TtlClass; 3] = [TtlClass::Short, TtlClass::Medium, TtlClass::Long];

    pub fn seconds(&self) -> u64 {
        match self {
            TtlClass::Short => 120,
            TtlClass::Medium => 300,
            TtlClass::Long => 7_200,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TtlClass::Short => "SHORT",
            TtlClass::Medium => "MEDIUM",
            TtlClass::Long => "LONG",
        }
    }
}
