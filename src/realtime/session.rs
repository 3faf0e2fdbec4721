//! WebSocket Session
//!
//! One task per socket. The first accepted event must be `authenticate`;
//! after that the connection is registered and a writer task drains its
//! outbox onto the socket in order.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, WeakUnboundedSender};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::realtime::dispatcher::NotificationDispatcher;
use crate::realtime::payload::Role;
use crate::realtime::protocol::{AuthenticateRequest, ClientMessage, Frame, ServerMessage};
use crate::realtime::registry::{ConnectionId, ConnectionRecord};

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// How long an unauthenticated socket may stay open
    pub auth_timeout: Duration,
    /// Whether clients may use `send_notification`
    pub allow_client_dispatch: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(10),
            allow_client_dispatch: true,
        }
    }
}

type Sink = SplitSink<WebSocket, Message>;
type Stream = SplitStream<WebSocket>;

/// Drives one WebSocket from upgrade to disconnect.
pub async fn run_session(socket: WebSocket, dispatcher: NotificationDispatcher, settings: SessionSettings) {
    let (mut sink, mut stream) = socket.split();

    let Some(request) = await_authentication(&mut sink, &mut stream, settings.auth_timeout).await else {
        let _ = sink.close().await;
        return;
    };

    let connection_id = ConnectionId::new();
    let mut record = ConnectionRecord::new(
        connection_id,
        request.user_id,
        request.role.unwrap_or(Role::Student),
    );
    record.institution_id = request.institution_id;
    record.branch_id = request.branch_id;

    let registry = dispatcher.registry().clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    // The registry owns the only strong sender, so clearing it ends the writer
    let replies = tx.downgrade();
    if let Err(e) = registry.register(record.clone(), tx) {
        warn!(error = %e, "Failed to register connection");
        let _ = send_direct(&mut sink, &authenticated_failure(e.to_string())).await;
        return;
    }

    // Frames queued before the ack stay buffered in the outbox
    let ack = ServerMessage::Authenticated {
        success: true,
        connection_id: Some(connection_id.to_string()),
        error: None,
    };
    if send_direct(&mut sink, &ack).await.is_err() {
        registry.unregister(&connection_id);
        return;
    }
    info!(connection = %connection_id, user = %record.user_id, role = %record.role, "Session authenticated");

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.as_str().to_owned())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => handle_event(&text, &replies, &dispatcher, &settings),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            // Outbox closed (registry cleared) or the socket stopped accepting writes
            _ = &mut writer => break,
        }
    }

    registry.unregister(&connection_id);
    writer.abort();
    info!(connection = %connection_id, user = %record.user_id, "Session closed");
}

/// Reads events until a valid `authenticate` arrives or the deadline
/// passes. Anything else is answered with an error event.
async fn await_authentication(
    sink: &mut Sink,
    stream: &mut Stream,
    timeout: Duration,
) -> Option<AuthenticateRequest> {
    let deadline = Instant::now() + timeout;

    loop {
        let next = match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                debug!("Session did not authenticate in time");
                let _ = send_direct(sink, &authenticated_failure("authentication timed out")).await;
                return None;
            }
        };

        let text = match next {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Authenticate(request)) if !request.user_id.trim().is_empty() => {
                return Some(request);
            }
            Ok(ClientMessage::Authenticate(_)) => {
                send_direct(sink, &authenticated_failure("userId must not be empty")).await.ok()?;
            }
            Ok(_) => {
                send_direct(sink, &ServerMessage::error("authenticate first")).await.ok()?;
            }
            Err(e) => {
                send_direct(sink, &ServerMessage::error(format!("malformed event: {e}"))).await.ok()?;
            }
        }
    }
}

fn handle_event(
    text: &str,
    tx: &WeakUnboundedSender<Frame>,
    dispatcher: &NotificationDispatcher,
    settings: &SessionSettings,
) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Authenticate(_)) => ServerMessage::error("already authenticated"),
        Ok(ClientMessage::SendNotification(_)) if !settings.allow_client_dispatch => {
            ServerMessage::error("client dispatch is disabled")
        }
        Ok(ClientMessage::SendNotification(request)) => {
            let payload = request.notification.into_payload();
            let report = dispatcher.send_to_users(&request.target_users, &payload);
            ServerMessage::NotificationSent {
                delivered: report.delivered,
            }
        }
        Err(e) => ServerMessage::error(format!("malformed event: {e}")),
    };

    queue(tx, &reply);
}

fn queue(tx: &WeakUnboundedSender<Frame>, message: &ServerMessage) {
    let Some(tx) = tx.upgrade() else {
        return;
    };
    match Frame::encode(message) {
        Ok(frame) => {
            let _ = tx.send(frame);
        }
        Err(e) => warn!(error = %e, "Failed to encode reply"),
    }
}

async fn send_direct(sink: &mut Sink, message: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(text)).await
}

fn authenticated_failure(error: impl Into<String>) -> ServerMessage {
    ServerMessage::Authenticated {
        success: false,
        connection_id: None,
        error: Some(error.into()),
    }
}
