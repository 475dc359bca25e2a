//! HTTP API response DTOs for the chat relay.

use serde::{Deserialize, Serialize};

/// Local view of a room on this process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: String,
    /// Channel this room is published on
    pub channel: String,
    /// Whether this process currently holds a subscription to the channel
    pub subscribed: bool,
    pub members: Vec<MemberDetailDto>,
}

/// Member detail for room detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDetailDto {
    pub connection_id: String,
    pub username: String,
    pub connected_at: String, // ISO 8601
}
