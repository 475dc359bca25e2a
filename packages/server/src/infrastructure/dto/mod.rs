//! Data transfer objects for the HTTP API and the WebSocket wire format.

pub mod http;
pub mod websocket;
