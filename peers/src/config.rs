//! Peers configuration with TOML file support.

use std::path::{Path, PathBuf};
use std::time::Duration;

use datt_network::{LinkOptions, SocketConfig, WebSocketConfig};
use datt_utils::LogFormat;
use serde::{Deserialize, Serialize};

use crate::PeersError;

/// Configuration for one datt peer.
///
/// Loaded from TOML via [`PeersConfig::from_toml_file`] or built in code
/// (tests use [`PeersConfig::ephemeral`]). Every field has a default, so an
/// empty file is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeersConfig {
    /// Bound on a single outbound dial.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Bound on each transport's initialization.
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,

    /// Frames queued per connection before sends are refused.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Messages buffered per inbound subscriber before it lags.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    /// Directory for the content archive.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub socket: SocketConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_init_timeout_ms() -> u64 {
    10_000
}

fn default_outbound_queue() -> usize {
    256
}

fn default_inbound_capacity() -> usize {
    1024
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./datt_data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PeersConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, PeersError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PeersError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, PeersError> {
        toml::from_str(s).map_err(|e| PeersError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, PeersError> {
        toml::to_string_pretty(self).map_err(|e| PeersError::Config(e.to_string()))
    }

    /// Both transports on loopback ephemeral ports.
    pub fn ephemeral() -> Self {
        Self {
            socket: SocketConfig::ephemeral(),
            websocket: WebSocketConfig::ephemeral(),
            ..Self::default()
        }
    }

    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            outbound_queue: self.outbound_queue,
            inbound_capacity: self.inbound_capacity,
        }
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            init_timeout_ms: default_init_timeout_ms(),
            outbound_queue: default_outbound_queue(),
            inbound_capacity: default_inbound_capacity(),
            data_dir: default_data_dir(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            socket: SocketConfig::default(),
            websocket: WebSocketConfig::default(),
        }
    }
}
