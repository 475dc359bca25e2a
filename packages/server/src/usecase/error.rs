//! UseCase 層のエラー定義

use thiserror::Error;

/// Reasons a connection is rejected before joining a room
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Malformed room identifier, or the connection is already in another room
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The identity collaborator could not name the caller
    #[error("identity resolution failed: {0}")]
    IdentityResolutionFailed(String),

    /// The room's channel could not be subscribed; the join was rolled back
    #[error("failed to subscribe to room channel: {0}")]
    SubscribeFailed(String),
}

/// Reasons an inbound chat message was not published
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    /// Payload is not `{"message": "<text>"}` with valid text
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The broker rejected the publish. Not retried.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}
