//! Real-time channel wire events.
//!
//! Every frame is a JSON object `{"event": <name>, "data": {...}}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::realtime::payload::{NotificationKind, NotificationPayload, Priority, Role};

// == Client -> Server ==
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate(AuthenticateRequest),
    SendNotification(SendNotificationRequest),
}

/// Identity claimed by an already-authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    pub user_id: String,
    /// Sessions that omit a role are indexed as students
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    pub target_users: Vec<String>,
    pub notification: NotificationDraft,
}

/// Notification fields a client may supply; id and timestamp are assigned
/// by the server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotificationDraft {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NotificationDraft {
    pub fn into_payload(self) -> NotificationPayload {
        self.metadata.into_iter().fold(
            NotificationPayload::builder(self.kind, self.title, self.message).priority(self.priority),
            |builder, (key, value)| builder.metadata(key, value),
        )
        .build()
    }
}

// == Server -> Client ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Authenticated {
        success: bool,
        #[serde(rename = "connectionId", skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Notification(NotificationPayload),
    NotificationSent {
        delivered: usize,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

// == Frame ==
/// A serialized server message. Cloning shares the same bytes, so every
/// recipient of one dispatch gets an identical frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Arc<str>);

impl Frame {
    pub fn encode(message: &ServerMessage) -> serde_json::Result<Self> {
        serde_json::to_string(message).map(|text| Frame(text.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if both frames share one allocation.
    pub fn same_bytes(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_authenticate() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"authenticate","data":{"userId":"u1"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Authenticate(AuthenticateRequest {
                user_id: "u1".into(),
                role: None,
                institution_id: None,
                branch_id: None,
            })
        );
    }

    #[test]
    fn test_full_authenticate() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"event":"authenticate","data":{"userId":"u1","role":"professor","institutionId":"inst-1","branchId":"cs"}}"#,
        )
        .unwrap();
        let ClientMessage::Authenticate(req) = msg else {
            panic!("expected authenticate");
        };
        assert_eq!(req.role, Some(Role::Professor));
        assert_eq!(req.branch_id.as_deref(), Some("cs"));
    }

    #[test]
    fn test_send_notification() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"event":"send_notification","data":{"targetUsers":["u1"],"notification":{"type":"notice","title":"Holiday","message":"Closed Friday"}}}"#,
        )
        .unwrap();
        let ClientMessage::SendNotification(req) = msg else {
            panic!("expected send_notification");
        };
        assert_eq!(req.target_users, vec!["u1".to_string()]);

        let payload = req.notification.into_payload();
        assert_eq!(payload.kind(), NotificationKind::Notice);
        assert_eq!(payload.priority(), Priority::Normal);
    }

    #[test]
    fn test_server_messages_shape() {
        let json = serde_json::to_value(ServerMessage::Authenticated {
            success: true,
            connection_id: None,
            error: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"event":"authenticated","data":{"success":true}}));

        let payload = NotificationPayload::builder(NotificationKind::Reminder, "t", "m").build();
        let json = serde_json::to_value(ServerMessage::Notification(payload.clone())).unwrap();
        assert_eq!(json["event"], "notification");
        assert_eq!(json["data"]["id"], payload.id());
        assert_eq!(json["data"]["type"], "reminder");
    }

    #[test]
    fn test_frame_clones_share_bytes() {
        let frame = Frame::encode(&ServerMessage::error("x")).unwrap();
        let copy = frame.clone();
        assert!(frame.same_bytes(&copy));
        assert_eq!(copy.as_str(), r#"{"event":"error","data":{"message":"x"}}"#);
    }
}
