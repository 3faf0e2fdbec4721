//! Key namespaces and the composed-key type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};

/// Maximum raw key length in bytes
pub const MAX_RAW_KEY_LENGTH: usize = 256;

// == Cache Prefix ==
/// Namespace tag prepended to every raw key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CachePrefix {
    Student,
    Professor,
    Course,
    Assignment,
    Marks,
    Attendance,
    Notice,
    Dashboard,
    Analytics,
    Department,
    User,
}

impl CachePrefix {
    pub const ALL: [CachePrefix; 11] = [
        CachePrefix::Student,
        CachePrefix::Professor,
        CachePrefix::Course,
        CachePrefix::Assignment,
        CachePrefix::Marks,
        CachePrefix::Attendance,
        CachePrefix::Notice,
        CachePrefix::Dashboard,
        CachePrefix::Analytics,
        CachePrefix::Department,
        CachePrefix::User,
    ];

    /// Key segment written in front of the raw key.
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePrefix::Student => "students",
            CachePrefix::Professor => "professors",
            CachePrefix::Course => "courses",
            CachePrefix::Assignment => "assignments",
            CachePrefix::Marks => "marks",
            CachePrefix::Attendance => "attendance",
            CachePrefix::Notice => "notices",
            CachePrefix::Dashboard => "dashboard",
            CachePrefix::Analytics => "analytics",
            CachePrefix::Department => "department",
            CachePrefix::User => "user",
        }
    }

    /// Catalog name, as exposed by cache stats.
    pub fn name(&self) -> &'static str {
        match self {
            CachePrefix::Student => "STUDENT",
            CachePrefix::Professor => "PROFESSOR",
            CachePrefix::Course => "COURSE",
            CachePrefix::Assignment => "ASSIGNMENT",
            CachePrefix::Marks => "MARKS",
            CachePrefix::Attendance => "ATTENDANCE",
            CachePrefix::Notice => "NOTICE",
            CachePrefix::Dashboard => "DASHBOARD",
            CachePrefix::Analytics => "ANALYTICS",
            CachePrefix::Department => "DEPARTMENT",
            CachePrefix::User => "USER",
        }
    }

    /// Glob selecting every key in this namespace.
    pub fn wildcard(&self) -> String {
        format!("{}:*", self.as_str())
    }
}

impl fmt::Display for CachePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Key ==
/// A validated `prefix:rawKey` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validates `raw` and composes it under `prefix`.
    pub fn new(prefix: CachePrefix, raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(HubError::InvalidKey("key cannot be empty".to_string()));
        }
        if raw.len() > MAX_RAW_KEY_LENGTH {
            return Err(HubError::InvalidKey(format!(
                "key exceeds maximum length of {} bytes",
                MAX_RAW_KEY_LENGTH
            )));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(HubError::InvalidKey(format!(
                "key '{}' contains whitespace or control characters",
                raw.escape_debug()
            )));
        }
        Ok(Self(format!("{}:{}", prefix.as_str(), raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_compose() {
        let key = CacheKey::new(CachePrefix::Student, "user:42").unwrap();
        assert_eq!(key.as_str(), "students:user:42");
    }

    #[test]
    fn test_prefix_segments_are_unique() {
        let segments: HashSet<&str> = CachePrefix::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(segments.len(), CachePrefix::ALL.len());
    }

    #[test]
    fn test_same_raw_key_never_aliases() {
        let a = CacheKey::new(CachePrefix::Student, "42").unwrap();
        let b = CacheKey::new(CachePrefix::Course, "42").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!(
            CacheKey::new(CachePrefix::User, ""),
            Err(HubError::InvalidKey(_))
        ));
        assert!(CacheKey::new(CachePrefix::User, "has space").is_err());
        assert!(CacheKey::new(CachePrefix::User, "tab\there").is_err());
        assert!(CacheKey::new(CachePrefix::User, &"x".repeat(MAX_RAW_KEY_LENGTH + 1)).is_err());
        assert!(CacheKey::new(CachePrefix::User, &"x".repeat(MAX_RAW_KEY_LENGTH)).is_ok());
    }

    #[test]
    fn test_wildcard_and_serde_name() {
        assert_eq!(CachePrefix::Dashboard.wildcard(), "dashboard:*");
        assert_eq!(
            serde_json::to_string(&CachePrefix::Student).unwrap(),
            "\"STUDENT\""
        );
        let parsed: CachePrefix = serde_json::from_str("\"COURSE\"").unwrap();
        assert_eq!(parsed, CachePrefix::Course);
        assert_eq!(CachePrefix::Course.name(), "COURSE");
    }
}
