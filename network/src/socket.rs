//! Raw TCP transport.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use datt_protocol::{read_frame, write_frame};
use datt_types::TransportKind;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, OnceCell};
use tracing::{info, warn};

use crate::driver::{spawn_connection, FrameSink, FrameSource};
use crate::network::{check_dial, classify_dial_error};
use crate::{
    ConnectError, Connection, ConnectionInfo, Direction, Inbound, LinkError, LinkOptions, Network,
    NetworkError, NetworkState, SocketConfig,
};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP transport. Endpoints are `ip:port`.
pub struct SocketNetwork {
    config: SocketConfig,
    state: Arc<NetworkState>,
    local_addr: OnceCell<SocketAddr>,
}

impl SocketNetwork {
    pub fn new(config: SocketConfig, options: LinkOptions) -> Self {
        Self {
            config,
            state: NetworkState::new(TransportKind::SOCKET, options),
            local_addr: OnceCell::new(),
        }
    }

    /// Bound listen address, once initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn state(&self) -> &Arc<NetworkState> {
        &self.state
    }

    async fn listen(&self) -> Result<SocketAddr, NetworkError> {
        let init_err = |reason: String| NetworkError::TransportInit {
            transport: TransportKind::SOCKET,
            reason,
        };
        let listener = TcpListener::bind(&self.config.bind)
            .await
            .map_err(|e| init_err(format!("bind {}: {e}", self.config.bind)))?;
        let local = listener
            .local_addr()
            .map_err(|e| init_err(format!("local address: {e}")))?;

        tokio::spawn(accept_loop(self.state.clone(), listener));
        info!(transport = %TransportKind::SOCKET, addr = %local, "listening");
        Ok(local)
    }
}

async fn accept_loop(state: Arc<NetworkState>, listener: TcpListener) {
    let shutdown = state.shutdown_token().clone();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    attach(&state, stream, addr.to_string(), Direction::Inbound);
                }
                Err(e) => {
                    warn!(transport = %state.kind(), error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

fn attach(
    state: &Arc<NetworkState>,
    stream: TcpStream,
    remote: String,
    direction: Direction,
) -> Arc<Connection> {
    let _ = stream.set_nodelay(true);
    let (reader, writer) = stream.into_split();
    spawn_connection(state, TcpSink(writer), TcpSource(reader), remote, direction)
}

struct TcpSink(OwnedWriteHalf);

#[async_trait]
impl FrameSink for TcpSink {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        Ok(write_frame(&mut self.0, frame).await?)
    }

    async fn close(&mut self) {
        let _ = self.0.shutdown().await;
    }
}

struct TcpSource(OwnedReadHalf);

#[async_trait]
impl FrameSource for TcpSource {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        Ok(read_frame(&mut self.0).await?)
    }
}

#[async_trait]
impl Network for SocketNetwork {
    fn kind(&self) -> TransportKind {
        TransportKind::SOCKET
    }

    async fn initialize(&self) -> Result<(), NetworkError> {
        if self.state.is_closed() {
            return Err(NetworkError::Closed(self.kind()));
        }
        self.local_addr.get_or_try_init(|| self.listen()).await?;
        Ok(())
    }

    fn connection_info(&self) -> Result<ConnectionInfo, NetworkError> {
        let endpoint = match (&self.config.advertise, self.local_addr()) {
            (Some(advertised), _) => advertised.clone(),
            (None, Some(local)) => local.to_string(),
            (None, None) => return Err(NetworkError::NotInitialized(self.kind())),
        };
        Ok(ConnectionInfo::new(self.kind(), endpoint))
    }

    async fn connect(&self, remote: &ConnectionInfo) -> Result<Arc<Connection>, ConnectError> {
        check_dial(&self.state, remote)?;
        let addr: SocketAddr = remote.endpoint.parse().map_err(|_| {
            ConnectError::MalformedInfo(format!("not an ip:port endpoint: {}", remote.endpoint))
        })?;

        let after = self.state.options().connect_timeout;
        let stream = match tokio::time::timeout(after, TcpStream::connect(addr)).await {
            Err(_) => {
                return Err(ConnectError::Timeout {
                    endpoint: remote.endpoint.clone(),
                    after,
                })
            }
            Ok(Err(e)) => return Err(classify_dial_error(&remote.endpoint, e)),
            Ok(Ok(stream)) => stream,
        };
        if self.state.is_closed() {
            return Err(ConnectError::Closed);
        }
        Ok(attach(&self.state, stream, addr.to_string(), Direction::Outbound))
    }

    fn connections(&self) -> Vec<Arc<Connection>> {
        self.state.connections().snapshot()
    }

    fn subscribe_inbound(&self) -> broadcast::Receiver<Inbound> {
        self.state.subscribe_inbound()
    }

    fn stats(&self) -> BTreeMap<&'static str, u64> {
        self.state.stats().snapshot()
    }

    async fn close(&self) -> Result<(), NetworkError> {
        if self.state.shutdown() {
            info!(transport = %self.kind(), "transport closed");
        }
        Ok(())
    }
}
