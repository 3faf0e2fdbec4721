//! Cache Invalidation Policy
//!
//! Maps a successful write on a resource type to the glob patterns that must
//! be purged before the write's response is returned. Patterns err on the
//! broad side: a needless miss is cheap, a stale read is not.
//!
//! Key layout the patterns rely on:
//! - entity namespaces (`students:*`, `courses:*`, ...) hold arbitrary raw keys
//! - `dashboard:<view>:<scopeId>[:...]` holds per-scope aggregate views
//! - `analytics:<scopeId>[:...]` holds per-scope computed analytics

use serde::{Deserialize, Serialize};

use crate::cache::CachePrefix;

// == Resource Kind ==
/// Resource families the CRUD layer mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Student,
    Professor,
    Course,
    Assignment,
    Marks,
    Attendance,
    Notice,
    Department,
    User,
}

struct Rule {
    /// Entity namespaces wiped entirely
    namespaces: &'static [CachePrefix],
    /// Dashboard views derived from this resource
    views: &'static [&'static str],
    /// Whether per-scope analytics depend on this resource
    analytics: bool,
}

fn rule(resource: ResourceKind) -> Rule {
    use CachePrefix as P;
    match resource {
        ResourceKind::Student => Rule {
            namespaces: &[P::Student],
            views: &["analytics", "stats"],
            analytics: true,
        },
        ResourceKind::Professor => Rule {
            namespaces: &[P::Professor],
            views: &["stats"],
            analytics: false,
        },
        ResourceKind::Course => Rule {
            // Professor directory entries list the courses taught
            namespaces: &[P::Course, P::Professor],
            views: &["analytics", "stats"],
            analytics: true,
        },
        ResourceKind::Assignment => Rule {
            namespaces: &[P::Assignment],
            views: &["stats", "deadlines"],
            analytics: false,
        },
        ResourceKind::Marks => Rule {
            namespaces: &[P::Marks],
            views: &["analytics", "performance"],
            analytics: true,
        },
        ResourceKind::Attendance => Rule {
            namespaces: &[P::Attendance],
            views: &["analytics", "attendance"],
            analytics: true,
        },
        ResourceKind::Notice => Rule {
            namespaces: &[P::Notice],
            views: &["notices"],
            analytics: false,
        },
        ResourceKind::Department => Rule {
            namespaces: &[P::Department],
            views: &["stats"],
            analytics: false,
        },
        ResourceKind::User => Rule {
            namespaces: &[P::User],
            views: &[],
            analytics: false,
        },
    }
}

// == Policy ==
/// Stateless write-to-patterns mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheInvalidationPolicy;

impl CacheInvalidationPolicy {
    /// Patterns to invalidate after a write to `resource`.
    ///
    /// Without a scope, aggregates for every scope are purged. With a scope,
    /// aggregates are narrowed to keys starting with that scope id; entity
    /// namespaces are always purged whole.
    pub fn patterns_for(resource: ResourceKind, scope_id: Option<&str>) -> Vec<String> {
        let rule = rule(resource);
        let scope = scope_id.filter(|s| !s.is_empty()).map(escape_glob);

        let mut patterns: Vec<String> = rule.namespaces.iter().map(|p| p.wildcard()).collect();

        let dashboard = CachePrefix::Dashboard.as_str();
        for view in rule.views {
            patterns.push(match &scope {
                Some(scope) => format!("{dashboard}:{view}:{scope}*"),
                None => format!("{dashboard}:{view}:*"),
            });
        }

        if rule.analytics {
            let analytics = CachePrefix::Analytics.as_str();
            patterns.push(match &scope {
                Some(scope) => format!("{analytics}:{scope}*"),
                None => format!("{analytics}:*"),
            });
        }

        patterns
    }
}

/// Escapes glob metacharacters so a scope id only matches itself.
fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::glob_match;

    #[test]
    fn test_student_without_scope() {
        let patterns = CacheInvalidationPolicy::patterns_for(ResourceKind::Student, None);
        assert_eq!(
            patterns,
            vec![
                "students:*",
                "dashboard:analytics:*",
                "dashboard:stats:*",
                "analytics:*"
            ]
        );
    }

    #[test]
    fn test_scope_narrows_aggregates_only() {
        let patterns =
            CacheInvalidationPolicy::patterns_for(ResourceKind::Marks, Some("inst-1"));
        assert!(patterns.contains(&"marks:*".to_string()));
        assert!(patterns.contains(&"dashboard:analytics:inst-1*".to_string()));
        assert!(patterns.contains(&"analytics:inst-1*".to_string()));

        let scoped = "dashboard:analytics:inst-1*";
        assert!(glob_match(scoped, "dashboard:analytics:inst-1"));
        assert!(glob_match(scoped, "dashboard:analytics:inst-1:branch-cs"));
        assert!(!glob_match(scoped, "dashboard:analytics:inst-2"));
    }

    #[test]
    fn test_empty_scope_is_unscoped() {
        assert_eq!(
            CacheInvalidationPolicy::patterns_for(ResourceKind::Notice, Some("")),
            CacheInvalidationPolicy::patterns_for(ResourceKind::Notice, None)
        );
    }

    #[test]
    fn test_course_also_purges_professor_directory() {
        let patterns = CacheInvalidationPolicy::patterns_for(ResourceKind::Course, None);
        assert!(patterns.contains(&"courses:*".to_string()));
        assert!(patterns.contains(&"professors:*".to_string()));
    }

    #[test]
    fn test_scope_metacharacters_are_escaped() {
        let patterns =
            CacheInvalidationPolicy::patterns_for(ResourceKind::Attendance, Some("inst*"));
        assert!(patterns.contains(&r"analytics:inst\**".to_string()));
        assert!(glob_match(r"analytics:inst\**", "analytics:inst*:x"));
        assert!(!glob_match(r"analytics:inst\**", "analytics:institute"));
    }

    #[test]
    fn test_every_resource_purges_its_namespace() {
        for resource in [
            ResourceKind::Student,
            ResourceKind::Professor,
            ResourceKind::Course,
            ResourceKind::Assignment,
            ResourceKind::Marks,
            ResourceKind::Attendance,
            ResourceKind::Notice,
            ResourceKind::Department,
            ResourceKind::User,
        ] {
            let patterns = CacheInvalidationPolicy::patterns_for(resource, None);
            assert!(!patterns.is_empty(), "{resource:?} has no patterns");
            assert!(patterns[0].ends_with(":*"));
        }
    }
}
