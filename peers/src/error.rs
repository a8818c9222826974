use std::time::Duration;

use datt_network::{ConnectError, NetworkError};
use datt_store::StoreError;
use datt_types::TransportKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeersError {
    #[error("transport {transport} failed to initialize: {source}")]
    TransportInit {
        transport: TransportKind,
        #[source]
        source: NetworkError,
    },

    #[error("transport {transport} did not initialize within {after:?}")]
    InitTimeout {
        transport: TransportKind,
        after: Duration,
    },

    #[error("no transport registered for {0:?}")]
    UnknownTransport(String),

    #[error("transport {0} registered twice")]
    DuplicateTransport(TransportKind),

    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("config error: {0}")]
    Config(String),

    #[error("{} transport(s) failed to close", .0.len())]
    Close(Vec<(TransportKind, NetworkError)>),

    #[error("peers are closed")]
    Closed,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PeersError {
    /// The transport an initialization failure belongs to.
    pub fn failed_transport(&self) -> Option<&TransportKind> {
        match self {
            PeersError::TransportInit { transport, .. } | PeersError::InitTimeout { transport, .. } => {
                Some(transport)
            }
            _ => None,
        }
    }
}
