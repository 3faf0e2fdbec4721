//! Notification payloads and audiences.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HubError;

// == Role ==
/// Session role used for audience selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Professor,
    Hod,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Professor, Role::Hod, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Professor => "professor",
            Role::Hod => "hod",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| HubError::InvalidRequest(format!("unknown role '{s}'")))
    }
}

// == Kind / Priority ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Notice,
    Grade,
    Attendance,
    Assignment,
    System,
    Reminder,
    Announcement,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

// == Audience ==
/// Institution and/or branch scope. At least one id must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
}

impl Scope {
    pub fn institution(id: impl Into<String>) -> Self {
        Self {
            institution_id: Some(id.into()),
            branch_id: None,
        }
    }

    pub fn branch(id: impl Into<String>) -> Self {
        Self {
            institution_id: None,
            branch_id: Some(id.into()),
        }
    }

    pub fn with_branch(mut self, id: impl Into<String>) -> Self {
        self.branch_id = Some(id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.institution_id.is_none() && self.branch_id.is_none()
    }
}

/// Who a notification is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Audience {
    Users {
        #[serde(rename = "userIds")]
        user_ids: Vec<String>,
    },
    Role {
        role: Role,
    },
    Scope(Scope),
}

// == Notification Payload ==
/// Immutable notification. Construct through [`NotificationPayload::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    id: String,
    #[serde(rename = "type")]
    kind: NotificationKind,
    title: String,
    message: String,
    priority: Priority,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    metadata: serde_json::Map<String, serde_json::Value>,
    timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn builder(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> NotificationBuilder {
        NotificationBuilder {
            kind,
            title: title.into(),
            message: message.into(),
            priority: Priority::default(),
            metadata: serde_json::Map::new(),
            id: None,
            timestamp: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

pub struct NotificationBuilder {
    kind: NotificationKind,
    title: String,
    message: String,
    priority: Priority,
    metadata: serde_json::Map<String, serde_json::Value>,
    id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl NotificationBuilder {
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Overrides the generated id, e.g. to reuse the id of a stored notice.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> NotificationPayload {
        NotificationPayload {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: self.kind,
            title: self.title,
            message: self.message,
            priority: self.priority,
            metadata: self.metadata,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let payload = NotificationPayload::builder(NotificationKind::Grade, "Marks posted", "DBMS mid-term")
            .priority(Priority::High)
            .metadata("courseId", "cs-301")
            .id("n-1")
            .build();

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["id"], "n-1");
        assert_eq!(json["type"], "grade");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["metadata"]["courseId"], "cs-301");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_defaults() {
        let payload = NotificationPayload::builder(NotificationKind::System, "t", "m").build();
        assert_eq!(payload.priority(), Priority::Normal);
        assert!(payload.metadata().is_empty());
        assert!(Uuid::parse_str(payload.id()).is_ok());

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Professor".parse::<Role>().unwrap(), Role::Professor);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_audience_serde() {
        let audience: Audience =
            serde_json::from_str(r#"{"kind":"users","userIds":["u1","u2"]}"#).unwrap();
        assert_eq!(
            audience,
            Audience::Users {
                user_ids: vec!["u1".into(), "u2".into()]
            }
        );

        let audience: Audience = serde_json::from_str(r#"{"kind":"role","role":"professor"}"#).unwrap();
        assert_eq!(audience, Audience::Role { role: Role::Professor });

        let audience: Audience =
            serde_json::from_str(r#"{"kind":"scope","institutionId":"inst-1"}"#).unwrap();
        assert_eq!(audience, Audience::Scope(Scope::institution("inst-1")));
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low < Priority::Normal);
    }
}
