//! Request DTOs for the hub API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::invalidation::ResourceKind;
use crate::realtime::{Audience, NotificationDraft};

/// Request body for POST /cache/invalidate
///
/// # Fields
/// - `resource`: Resource family that was written (`STUDENT`, `COURSE`, ...)
/// - `scopeId`: Optional department/branch scope of the write
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
    pub resource: ResourceKind,
    #[serde(default)]
    pub scope_id: Option<String>,
}

/// Request body for POST /notifications
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyRequest {
    pub audience: Audience,
    pub notification: NotificationDraft,
}

impl NotifyRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.notification.title.trim().is_empty() {
            return Some("Notification title cannot be empty".to_string());
        }
        match &self.audience {
            Audience::Users { user_ids } if user_ids.is_empty() => {
                Some("Audience must name at least one user".to_string())
            }
            Audience::Scope(scope) if scope.is_empty() => {
                Some("Scope audience needs an institutionId or branchId".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::Role;

    #[test]
    fn test_invalidate_request_deserialize() {
        let req: InvalidateRequest =
            serde_json::from_str(r#"{"resource": "STUDENT", "scopeId": "dept-7"}"#).unwrap();
        assert_eq!(req.resource, ResourceKind::Student);
        assert_eq!(req.scope_id.as_deref(), Some("dept-7"));

        let req: InvalidateRequest = serde_json::from_str(r#"{"resource": "COURSE"}"#).unwrap();
        assert!(req.scope_id.is_none());
    }

    #[test]
    fn test_invalidate_request_unknown_resource() {
        assert!(serde_json::from_str::<InvalidateRequest>(r#"{"resource": "BUILDING"}"#).is_err());
    }

    #[test]
    fn test_notify_request_deserialize() {
        let json = r#"{
            "audience": {"kind": "role", "role": "professor"},
            "notification": {"type": "announcement", "title": "Meeting", "message": "3pm", "priority": "high"}
        }"#;
        let req: NotifyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.audience, Audience::Role { role: Role::Professor });
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_rejects_empty_audiences() {
        let json = r#"{
            "audience": {"kind": "users", "userIds": []},
            "notification": {"type": "notice", "title": "t", "message": "m"}
        }"#;
        let req: NotifyRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_some());

        let json = r#"{
            "audience": {"kind": "scope"},
            "notification": {"type": "notice", "title": "t", "message": "m"}
        }"#;
        let req: NotifyRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        let json = r#"{
            "audience": {"kind": "users", "userIds": ["u1"]},
            "notification": {"type": "notice", "title": "  ", "message": "m"}
        }"#;
        let req: NotifyRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_some());
    }
}
