//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// SSE keep-alive comment interval in seconds.
    pub sse_keepalive_secs: u64,
    /// Whether to attach a permissive CORS layer.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            sse_keepalive_secs: 15,
            cors: true,
        }
    }
}

impl ServerConfig {
    /// The `host:port` string this config binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
