//! Notification Dispatcher
//!
//! Resolves an audience against the registry and queues one shared frame on
//! every matching connection. Never blocks and never fails the caller.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::realtime::payload::{Audience, NotificationPayload, Role, Scope};
use crate::realtime::protocol::{Frame, ServerMessage};
use crate::realtime::registry::ConnectionRegistry;

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Live connections matched by the audience.
    pub targeted: usize,
    /// Connections the frame was queued on.
    pub delivered: usize,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn send_to_user(&self, user_id: &str, payload: &NotificationPayload) -> DeliveryReport {
        self.dispatch(
            &Audience::Users {
                user_ids: vec![user_id.to_string()],
            },
            payload,
        )
    }

    pub fn send_to_users(&self, user_ids: &[String], payload: &NotificationPayload) -> DeliveryReport {
        self.dispatch(
            &Audience::Users {
                user_ids: user_ids.to_vec(),
            },
            payload,
        )
    }

    pub fn broadcast_to_role(&self, role: Role, payload: &NotificationPayload) -> DeliveryReport {
        self.dispatch(&Audience::Role { role }, payload)
    }

    pub fn broadcast_to_scope(&self, scope: &Scope, payload: &NotificationPayload) -> DeliveryReport {
        self.dispatch(&Audience::Scope(scope.clone()), payload)
    }

    // == Dispatch ==
    /// Serializes `payload` once and pushes it to every connection the
    /// audience resolves to. Users without a live connection are skipped.
    pub fn dispatch(&self, audience: &Audience, payload: &NotificationPayload) -> DeliveryReport {
        let frame = match Frame::encode(&ServerMessage::Notification(payload.clone())) {
            Ok(frame) => frame,
            Err(e) => {
                error!(notification = %payload.id(), error = %e, "Failed to encode notification");
                return DeliveryReport::default();
            }
        };

        let (targeted, delivered) = self.registry.push(audience, &frame);
        if targeted == 0 {
            debug!(notification = %payload.id(), ?audience, "No live recipients");
        } else {
            debug!(
                notification = %payload.id(),
                targeted,
                delivered,
                "Notification dispatched"
            );
        }

        DeliveryReport { targeted, delivered }
    }
}
