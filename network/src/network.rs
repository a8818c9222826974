//! The transport contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use datt_types::TransportKind;
use tokio::sync::broadcast;

use crate::{ConnectError, Connection, ConnectionInfo, Inbound, NetworkError, NetworkState};

/// One transport and every connection it owns.
///
/// Implementations must let concurrent `connect` calls proceed
/// independently, and must make connection-set changes visible to the next
/// [`connections`](Self::connections) call.
#[async_trait]
pub trait Network: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Prepare to accept and initiate connections (bind listeners etc).
    ///
    /// Calling it again after success is a no-op.
    async fn initialize(&self) -> Result<(), NetworkError>;

    /// What a remote peer needs to dial this transport. Requires `initialize`.
    fn connection_info(&self) -> Result<ConnectionInfo, NetworkError>;

    /// Dial a remote peer. Bounded by the transport's connect timeout.
    async fn connect(&self, remote: &ConnectionInfo) -> Result<Arc<Connection>, ConnectError>;

    /// Live connections, oldest first.
    fn connections(&self) -> Vec<Arc<Connection>>;

    /// Every message delivered on any connection of this transport.
    fn subscribe_inbound(&self) -> broadcast::Receiver<Inbound>;

    fn stats(&self) -> BTreeMap<&'static str, u64>;

    /// Tear down all connections and release resources. Idempotent.
    async fn close(&self) -> Result<(), NetworkError>;
}

/// Reject dial attempts aimed at another transport or a closed one.
pub(crate) fn check_dial(state: &NetworkState, remote: &ConnectionInfo) -> Result<(), ConnectError> {
    if &remote.transport != state.kind() {
        return Err(ConnectError::TransportMismatch {
            expected: state.kind().clone(),
            actual: remote.transport.clone(),
        });
    }
    if state.is_closed() {
        return Err(ConnectError::Closed);
    }
    Ok(())
}

/// Map a failed TCP dial onto the connect error kinds.
pub(crate) fn classify_dial_error(endpoint: &str, e: std::io::Error) -> ConnectError {
    if e.kind() == std::io::ErrorKind::ConnectionRefused {
        ConnectError::Refused {
            endpoint: endpoint.to_string(),
        }
    } else {
        ConnectError::Io(e)
    }
}
