//! インメモリ実装

mod connection_registry;

pub use connection_registry::InMemoryConnectionRegistry;
