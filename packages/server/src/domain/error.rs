//! Domain layer error definitions.

use thiserror::Error;

use super::value_object::{ConnectionId, RoomId};

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// RoomId validation error
    #[error("RoomId cannot be empty")]
    RoomIdEmpty,

    /// RoomId too long error
    #[error("RoomId cannot exceed {max} characters (got {actual})")]
    RoomIdTooLong { max: usize, actual: usize },

    /// RoomId contains a character outside `[A-Za-z0-9._-]`
    #[error("RoomId contains invalid character {0:?}")]
    RoomIdInvalidCharacter(char),

    /// DisplayName validation error
    #[error("DisplayName cannot be empty")]
    DisplayNameEmpty,

    /// DisplayName too long error
    #[error("DisplayName cannot exceed {max} characters (got {actual})")]
    DisplayNameTooLong { max: usize, actual: usize },

    /// MessageContent validation error
    #[error("MessageContent cannot be empty")]
    MessageContentEmpty,

    /// MessageContent too long error
    #[error("MessageContent cannot exceed {max} characters (got {actual})")]
    MessageContentTooLong { max: usize, actual: usize },
}

/// Errors returned by the connection registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The request was rejected before touching any state
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RegistryError {
    pub(crate) fn already_in_room(connection_id: &ConnectionId, current: &RoomId) -> Self {
        Self::InvalidArgument(format!(
            "connection {connection_id} is already a member of room '{current}'"
        ))
    }
}

/// Errors returned by a pub/sub transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PubSubError {
    /// The broker cannot be reached
    #[error("pub/sub broker unavailable: {0}")]
    Unavailable(String),

    /// Unsubscribe was requested for a channel this process never subscribed to
    #[error("not subscribed to channel '{0}'")]
    NotSubscribed(String),
}

/// Errors returned by the identity collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The connection carried no identity
    #[error("no identity supplied")]
    Missing,

    /// The supplied identity is not a usable display name
    #[error("invalid identity: {0}")]
    Invalid(#[from] ValueObjectError),
}

/// Errors raised by the connection lifecycle state machine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionStateError {
    /// The requested transition is not allowed from the current state
    #[error("cannot {event} a connection in state {from}")]
    InvalidTransition { from: String, event: &'static str },
}
