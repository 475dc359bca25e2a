//! WebSocket chat server implementation.

mod handler;
mod runner;
mod signal;
pub mod state;

pub use runner::{create_router, run, serve};
pub use signal::shutdown_signal;
pub use state::AppState;
