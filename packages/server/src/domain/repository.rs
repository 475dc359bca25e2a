//! Connection registry trait.
//!
//! The registry is process-local bookkeeping of which connections are joined to
//! which room. All operations are in-memory and synchronous so they can run
//! from `Drop` during cancellation cleanup.

use std::collections::HashSet;

use super::{
    entity::{Member, Outbox},
    error::RegistryError,
    value_object::{ConnectionId, RoomId},
};

pub trait ConnectionRegistry: Send + Sync {
    /// Add `member` to `room_id`.
    ///
    /// Joining the same room twice is a no-op. Joining a second room while
    /// still a member of another fails with `InvalidArgument` and changes nothing.
    fn join(&self, room_id: &RoomId, member: Member) -> Result<(), RegistryError>;

    /// Remove the connection from `room_id`. No-op if absent.
    ///
    /// Returns `true` when the room has no local members afterwards.
    fn leave(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool;

    /// Connections currently joined to `room_id` on this process
    fn members_of(&self, room_id: &RoomId) -> HashSet<ConnectionId>;

    /// Snapshot of outbound queues for fanout
    fn outboxes_of(&self, room_id: &RoomId) -> Vec<(ConnectionId, Outbox)>;

    /// Snapshot of full membership records
    fn members_detail(&self, room_id: &RoomId) -> Vec<Member>;
}
