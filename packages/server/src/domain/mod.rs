//! Domain layer for the chat relay.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and infrastructure concerns.

pub mod entity;
pub mod error;
pub mod factory;
pub mod identity;
pub mod pubsub;
pub mod repository;
pub mod value_object;

pub use entity::{
    Connection, ConnectionState, EventType, Member, MessageEnvelope, Outbox,
};
pub use error::{
    ConnectionStateError, IdentityError, PubSubError, RegistryError, ValueObjectError,
};
pub use factory::ConnectionIdFactory;
pub use identity::IdentityResolver;
pub use pubsub::{EnvelopeHandler, PubSubTransport};
pub use repository::ConnectionRegistry;
pub use value_object::{
    ChannelName, ConnectionId, DisplayName, MessageContent, RoomId, Timestamp,
};
