//! WebSocket message DTOs for the chat relay.

use serde::{Deserialize, Serialize};

use crate::domain::MessageEnvelope;

/// Message sent by a client: `{"message": "<text>"}`
///
/// Any other shape, including extra fields, is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InboundChatMessage {
    pub message: String,
}

/// Message pushed to a client: `{"message": "<text>", "username": "<name>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundChatMessage {
    pub message: String,
    pub username: String,
}

impl From<&MessageEnvelope> for OutboundChatMessage {
    fn from(envelope: &MessageEnvelope) -> Self {
        Self {
            message: envelope.text().as_str().to_string(),
            username: envelope.sender_display_name().as_str().to_string(),
        }
    }
}
