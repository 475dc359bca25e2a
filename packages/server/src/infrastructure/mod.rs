//! Infrastructure layer: concrete registry, pub/sub transport, identity
//! resolver and wire DTOs.

pub mod dto;
pub mod identity;
pub mod pubsub;
pub mod repository;
