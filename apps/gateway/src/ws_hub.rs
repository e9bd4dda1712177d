// [apps/gateway/src/ws_hub.rs]
//! Broadcast hub for server-pushed WebSocket frames. Every connected
//! socket subscribes to this channel and filters frames locally against
//! whatever sessions/commands it has asked to follow.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsEvent {
    #[serde(rename = "COMMAND_STATUS_UPDATE")]
    CommandStatusUpdate { execution_id: Uuid, status: String },
    #[serde(rename = "APPROVAL_REQUESTED")]
    ApprovalRequested { execution_id: Uuid, requested_by: Uuid },
    #[serde(rename = "SESSION_SHARED")]
    SessionShared { session_id: Uuid, shared_with: Uuid },
    #[serde(rename = "SYSTEM_NOTIFICATION")]
    SystemNotification { message: String },
    #[serde(rename = "USER_JOINED")]
    UserJoined { session_id: Uuid, user_id: Uuid },
    #[serde(rename = "USER_LEFT")]
    UserLeft { session_id: Uuid, user_id: Uuid },
    #[serde(rename = "TYPING_INDICATOR")]
    TypingIndicator { session_id: Uuid, user_id: Uuid, is_typing: bool },
    #[serde(rename = "NEW_MESSAGE")]
    NewMessage { session_id: Uuid, user_id: Uuid, text: String },
}

impl WsEvent {
    /// The session or command id this event concerns, when it has one —
    /// lets a socket decide whether a frame matches one of its subscriptions.
    pub fn execution_id(&self) -> Option<Uuid> {
        match self {
            WsEvent::CommandStatusUpdate { execution_id, .. } => Some(*execution_id),
            WsEvent::ApprovalRequested { execution_id, .. } => Some(*execution_id),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            WsEvent::SessionShared { session_id, .. }
            | WsEvent::UserJoined { session_id, .. }
            | WsEvent::UserLeft { session_id, .. }
            | WsEvent::TypingIndicator { session_id, .. }
            | WsEvent::NewMessage { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }

    /// The user this event is attributed to, when it has one — folded into
    /// the outbound envelope's `user_id` field alongside `session_id`.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            WsEvent::ApprovalRequested { requested_by, .. } => Some(*requested_by),
            WsEvent::SessionShared { shared_with, .. } => Some(*shared_with),
            WsEvent::UserJoined { user_id, .. }
            | WsEvent::UserLeft { user_id, .. }
            | WsEvent::TypingIndicator { user_id, .. }
            | WsEvent::NewMessage { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }
}

pub struct WsHub {
    sender: broadcast::Sender<WsEvent>,
}

impl WsHub {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.sender.subscribe()
    }

    /// Best-effort publish: if nobody is listening, the send fails and is
    /// dropped silently, since a missed live-update frame doesn't threaten
    /// correctness (clients re-poll the REST surface).
    pub fn publish(&self, event: WsEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}
