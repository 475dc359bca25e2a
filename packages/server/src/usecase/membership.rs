//! Guaranteed leave for a joined connection.
//!
//! A [`MembershipGuard`] is created once a connection has joined. The normal
//! exit path calls [`MembershipGuard::release`]. If the owning task is
//! cancelled instead, `Drop` removes the registry entry synchronously and
//! schedules the channel release on the current runtime.

use crate::domain::{Connection, ConnectionState};

use super::disconnect_participant::DisconnectParticipantUseCase;

pub struct MembershipGuard {
    connection: Connection,
    state: ConnectionState,
    disconnect: DisconnectParticipantUseCase,
    released: bool,
}

impl MembershipGuard {
    /// Take ownership of a joined connection.
    ///
    /// `state` must be `Joined`; anything else is left untouched and simply
    /// carried until release.
    pub fn new(
        connection: Connection,
        state: ConnectionState,
        disconnect: DisconnectParticipantUseCase,
    ) -> Self {
        Self {
            connection,
            state,
            disconnect,
            released: false,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Leave the room and release the channel if this was the last local member
    pub async fn release(mut self) -> ConnectionState {
        self.released = true;
        self.state = self.transition_to_disconnected();
        self.disconnect.execute(&self.connection).await;
        self.state.clone()
    }

    fn transition_to_disconnected(&self) -> ConnectionState {
        match self.state.clone().disconnect() {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("Connection '{}': {}", self.connection.id, e);
                ConnectionState::Disconnected
            }
        }
    }
}

impl Drop for MembershipGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.state = self.transition_to_disconnected();
        let emptied = self.disconnect.leave(&self.connection);
        tracing::debug!(
            "Connection '{}' cleaned up on drop",
            self.connection.id
        );
        if !emptied {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let disconnect = self.disconnect.clone();
                let room_id = self.connection.room_id.clone();
                handle.spawn(async move {
                    disconnect.release_channel(&room_id).await;
                });
            }
            Err(_) => tracing::debug!(
                "No runtime available; channel for room '{}' released at shutdown",
                self.connection.room_id
            ),
        }
    }
}
