//! Connection info: what a remote peer needs to dial us.

use datt_types::TransportKind;
use serde::{Deserialize, Serialize};

use crate::ConnectError;

/// Self-describing, transport-tagged dial descriptor.
///
/// Exchanged out of band as JSON, e.g.
/// `{"transport":"socket","endpoint":"127.0.0.1:4070"}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub transport: TransportKind,
    pub endpoint: String,
}

impl ConnectionInfo {
    pub fn new(transport: TransportKind, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "transport": self.transport.as_str(),
            "endpoint": self.endpoint,
        })
        .to_string()
    }

    pub fn from_json(s: &str) -> Result<Self, ConnectError> {
        serde_json::from_str(s).map_err(|e| ConnectError::MalformedInfo(e.to_string()))
    }
}
