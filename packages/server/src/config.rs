//! Command-line configuration for the server binary.

use clap::Parser;

/// Room-based WebSocket chat relay
#[derive(Debug, Clone, Parser)]
#[command(name = "hiroba-server", version, about)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Prefix turning a room name into its pub/sub channel name
    #[arg(long, default_value = "chat_")]
    pub channel_prefix: String,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            channel_prefix: "chat_".to_string(),
            log_level: "info".to_string(),
        }
    }
}
