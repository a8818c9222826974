use std::time::Duration;

use datt_messages::MessageError;
use datt_protocol::ProtocolError;
use datt_types::TransportKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("{transport} transport failed to initialize: {reason}")]
    TransportInit {
        transport: TransportKind,
        reason: String,
    },

    #[error("{0} transport is not initialized")]
    NotInitialized(TransportKind),

    #[error("{0} transport is closed")]
    Closed(TransportKind),

    #[error("{transport} transport failed to shut down cleanly: {reason}")]
    Shutdown {
        transport: TransportKind,
        reason: String,
    },
}

/// Why an outbound connection could not be established.
///
/// The variants are distinct so callers can choose a retry policy.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("timed out after {after:?} connecting to {endpoint}")]
    Timeout { endpoint: String, after: Duration },

    #[error("connection refused by {endpoint}")]
    Refused { endpoint: String },

    #[error("malformed connection info: {0}")]
    MalformedInfo(String),

    #[error("connection info is for {actual}, this transport is {expected}")]
    TransportMismatch {
        expected: TransportKind,
        actual: TransportKind,
    },

    #[error("transport is closed")]
    Closed,

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectError {
    /// Timeouts and refusals may succeed later; the rest will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Refused { .. } | Self::Io(_))
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("connection is closed")]
    Closed,

    #[error("outbound queue is full")]
    QueueFull,
}

#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("no pong within {0:?}")]
    Timeout(Duration),

    #[error("connection closed while waiting for pong")]
    Closed,

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Encode(#[from] MessageError),
}

/// Failure on an established link; ends the connection.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
