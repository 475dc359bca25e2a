//! Core domain models for the chat relay.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

use super::{
    error::ConnectionStateError,
    value_object::{ConnectionId, DisplayName, MessageContent, RoomId, Timestamp},
};

/// Sending half of a connection's outbound queue.
///
/// The registry keeps a clone; the connection task owns the receiver, so the
/// registry never controls the connection's lifetime.
pub type Outbox = UnboundedSender<String>;

/// One client's live session, fixed to a single room for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Connection identifier
    pub id: ConnectionId,
    /// Name shown next to this connection's messages
    pub display_name: DisplayName,
    /// The room this connection joined
    pub room_id: RoomId,
    /// Timestamp when the connection joined
    pub connected_at: Timestamp,
}

impl Connection {
    /// Create a new connection record
    pub fn new(
        id: ConnectionId,
        display_name: DisplayName,
        room_id: RoomId,
        connected_at: Timestamp,
    ) -> Self {
        Self {
            id,
            display_name,
            room_id,
            connected_at,
        }
    }

    /// Build the membership record the registry stores for this connection
    pub fn member(&self, outbox: Outbox) -> Member {
        Member {
            connection_id: self.id,
            display_name: self.display_name.clone(),
            connected_at: self.connected_at,
            outbox,
        }
    }
}

/// Membership record held by the connection registry
#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub display_name: DisplayName,
    pub connected_at: Timestamp,
    pub outbox: Outbox,
}

/// Lifecycle of a connection.
///
/// ```text
/// Connecting -> Joined(room) -> Disconnected
///      \
///       -> Rejected
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Joined(RoomId),
    Disconnected,
    Rejected,
}

impl ConnectionState {
    /// `Connecting -> Joined(room)`
    pub fn join(self, room_id: RoomId) -> Result<Self, ConnectionStateError> {
        match self {
            Self::Connecting => Ok(Self::Joined(room_id)),
            other => Err(other.invalid("join")),
        }
    }

    /// `Connecting -> Rejected`
    pub fn reject(self) -> Result<Self, ConnectionStateError> {
        match self {
            Self::Connecting => Ok(Self::Rejected),
            other => Err(other.invalid("reject")),
        }
    }

    /// `Joined(room) -> Disconnected`
    pub fn disconnect(self) -> Result<Self, ConnectionStateError> {
        match self {
            Self::Joined(_) => Ok(Self::Disconnected),
            other => Err(other.invalid("disconnect")),
        }
    }

    fn invalid(&self, event: &'static str) -> ConnectionStateError {
        ConnectionStateError::InvalidTransition {
            from: self.to_string(),
            event,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Joined(room) => write!(f, "Joined({room})"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Event type carried by an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ChatMessage,
}

/// Unit published to a room's channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    event_type: EventType,
    room: RoomId,
    text: MessageContent,
    sender_display_name: DisplayName,
}

impl MessageEnvelope {
    /// Build a chat message envelope
    pub fn chat_message(room: RoomId, text: MessageContent, sender: DisplayName) -> Self {
        Self {
            event_type: EventType::ChatMessage,
            room,
            text,
            sender_display_name: sender,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn text(&self) -> &MessageContent {
        &self.text
    }

    pub fn sender_display_name(&self) -> &DisplayName {
        &self.sender_display_name
    }
}
