//! Pub/sub transport implementations.

mod inmemory;

pub use inmemory::{InMemoryBroker, InMemoryChannelLayer};
