//! Per-transport configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// TCP transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Listen address. Port 0 picks a free port.
    #[serde(default = "default_socket_bind")]
    pub bind: String,
    /// Endpoint to publish in connection info instead of the bound address.
    #[serde(default)]
    pub advertise: Option<String>,
}

/// WebSocket transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_websocket_bind")]
    pub bind: String,
    /// Full `ws://` URL to publish instead of the bound address.
    #[serde(default)]
    pub advertise: Option<String>,
}

/// Settings shared by every connection a transport creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkOptions {
    pub connect_timeout: Duration,
    /// Frames buffered per connection before sends report `QueueFull`.
    pub outbound_queue: usize,
    /// Capacity of the transport-wide inbound stream.
    pub inbound_capacity: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            outbound_queue: 256,
            inbound_capacity: 1024,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_socket_bind() -> String {
    "127.0.0.1:4070".to_string()
}

fn default_websocket_bind() -> String {
    "127.0.0.1:4071".to_string()
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            bind: default_socket_bind(),
            advertise: None,
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            bind: default_websocket_bind(),
            advertise: None,
        }
    }
}

impl SocketConfig {
    /// Loopback on an ephemeral port.
    pub fn ephemeral() -> Self {
        Self {
            bind: "127.0.0.1:0".into(),
            ..Self::default()
        }
    }
}

impl WebSocketConfig {
    pub fn ephemeral() -> Self {
        Self {
            bind: "127.0.0.1:0".into(),
            ..Self::default()
        }
    }
}
