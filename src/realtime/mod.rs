//! Real-time Module
//!
//! Live session registry and notification fan-out over WebSocket.

mod dispatcher;
mod payload;
mod protocol;
mod registry;
mod session;

pub use dispatcher::{DeliveryReport, NotificationDispatcher};
pub use payload::{
    Audience, NotificationBuilder, NotificationKind, NotificationPayload, Priority, Role, Scope,
};
pub use protocol::{
    AuthenticateRequest, ClientMessage, Frame, NotificationDraft, SendNotificationRequest,
    ServerMessage,
};
pub use registry::{ConnectionId, ConnectionRecord, ConnectionRegistry, Outbox};
pub use session::{run_session, SessionSettings};
