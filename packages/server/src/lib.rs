//! Room-based WebSocket chat relay.
//!
//! Clients join a named room over a WebSocket and every message they send is
//! published to the room's pub/sub channel. Each server process subscribed to
//! that channel pushes the message to its own local members, so rooms work the
//! same whether their members share a process or not.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
pub mod error;

// Re-export entry points
pub use config::ServerConfig;
pub use ui::run;
