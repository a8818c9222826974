//! WebSocket transport: one frame per binary message.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use datt_messages::{HEADER_LEN, MAX_PAYLOAD};
use datt_types::TransportKind;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, OnceCell};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig as WsProtocolConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::driver::{spawn_connection, FrameSink, FrameSource};
use crate::network::{check_dial, classify_dial_error};
use crate::{
    ConnectError, Connection, ConnectionInfo, Direction, Inbound, LinkError, LinkOptions, Network,
    NetworkError, NetworkState, WebSocketConfig,
};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Limits sized so one websocket message carries exactly one full frame.
fn protocol_config() -> WsProtocolConfig {
    let mut config = WsProtocolConfig::default();
    config.max_message_size = Some(HEADER_LEN + MAX_PAYLOAD);
    config.max_frame_size = Some(HEADER_LEN + MAX_PAYLOAD);
    config
}

/// WebSocket transport. Endpoints are `ws://host:port` URLs.
pub struct WebSocketNetwork {
    config: WebSocketConfig,
    state: Arc<NetworkState>,
    local_addr: OnceCell<SocketAddr>,
}

impl WebSocketNetwork {
    pub fn new(config: WebSocketConfig, options: LinkOptions) -> Self {
        Self {
            config,
            state: NetworkState::new(TransportKind::WEBSOCKET, options),
            local_addr: OnceCell::new(),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn state(&self) -> &Arc<NetworkState> {
        &self.state
    }

    async fn listen(&self) -> Result<SocketAddr, NetworkError> {
        let init_err = |reason: String| NetworkError::TransportInit {
            transport: TransportKind::WEBSOCKET,
            reason,
        };
        let listener = TcpListener::bind(&self.config.bind)
            .await
            .map_err(|e| init_err(format!("bind {}: {e}", self.config.bind)))?;
        let local = listener
            .local_addr()
            .map_err(|e| init_err(format!("local address: {e}")))?;

        tokio::spawn(accept_loop(self.state.clone(), listener));
        info!(transport = %TransportKind::WEBSOCKET, addr = %local, "listening");
        Ok(local)
    }
}

async fn accept_loop(state: Arc<NetworkState>, listener: TcpListener) {
    let shutdown = state.shutdown_token().clone();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                // Handshake off the accept loop so a slow client cannot stall it.
                Ok((stream, addr)) => {
                    tokio::spawn(upgrade(state.clone(), stream, addr));
                }
                Err(e) => {
                    warn!(transport = %state.kind(), error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

async fn upgrade(state: Arc<NetworkState>, stream: TcpStream, addr: SocketAddr) {
    let _ = stream.set_nodelay(true);
    let limit = state.options().connect_timeout;
    let handshake = tokio_tungstenite::accept_async_with_config(stream, Some(protocol_config()));
    match tokio::time::timeout(limit, handshake).await {
        Ok(Ok(ws)) if !state.is_closed() => {
            attach(&state, ws, addr.to_string(), Direction::Inbound);
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => debug!(remote = %addr, error = %e, "websocket handshake failed"),
        Err(_) => debug!(remote = %addr, "websocket handshake timed out"),
    }
}

fn attach<S>(
    state: &Arc<NetworkState>,
    ws: WebSocketStream<S>,
    remote: String,
    direction: Direction,
) -> Arc<Connection>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, source) = ws.split();
    spawn_connection(state, WsSink(sink), WsSource(source), remote, direction)
}

struct WsSink<S>(SplitSink<WebSocketStream<S>, Message>);

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.0.send(Message::Binary(frame.to_vec())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

struct WsSource<S>(SplitStream<WebSocketStream<S>>);

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        loop {
            match self.0.next().await {
                Some(Ok(Message::Binary(frame))) => return Ok(Some(frame)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Control frames are handled by tungstenite; text is not ours.
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
                    return Ok(None)
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

fn classify_ws_error(endpoint: &str, e: tungstenite::Error) -> ConnectError {
    match e {
        tungstenite::Error::Io(io) => classify_dial_error(endpoint, io),
        tungstenite::Error::Url(u) => ConnectError::MalformedInfo(u.to_string()),
        other => ConnectError::Handshake(other.to_string()),
    }
}

#[async_trait]
impl Network for WebSocketNetwork {
    fn kind(&self) -> TransportKind {
        TransportKind::WEBSOCKET
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
            (None, Some(local)) => format!("ws://{local}"),
            (None, None) => return Err(NetworkError::NotInitialized(self.kind())),
        };
        Ok(ConnectionInfo::new(self.kind(), endpoint))
    }

    async fn connect(&self, remote: &ConnectionInfo) -> Result<Arc<Connection>, ConnectError> {
        check_dial(&self.state, remote)?;
        if !remote.endpoint.starts_with("ws://") {
            return Err(ConnectError::MalformedInfo(format!(
                "not a ws:// url: {}",
                remote.endpoint
            )));
        }

        let after = self.state.options().connect_timeout;
        let dial = tokio_tungstenite::connect_async_with_config(
            remote.endpoint.as_str(),
            Some(protocol_config()),
            true,
        );
        let ws = match tokio::time::timeout(after, dial).await {
            Err(_) => {
                return Err(ConnectError::Timeout {
                    endpoint: remote.endpoint.clone(),
                    after,
                })
            }
            Ok(Err(e)) => return Err(classify_ws_error(&remote.endpoint, e)),
            Ok(Ok((ws, _response))) => ws,
        };
        if self.state.is_closed() {
            return Err(ConnectError::Closed);
        }
        Ok(attach(
            &self.state,
            ws,
            remote.endpoint.clone(),
            Direction::Outbound,
        ))
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

#[cfg(test)]
mod tests {
    use super::*;
    use datt_messages::Msg;

    async fn started() -> WebSocketNetwork {
        let net = WebSocketNetwork::new(WebSocketConfig::ephemeral(), LinkOptions::default());
        net.initialize().await.unwrap();
        net
    }

    #[tokio::test]
    async fn info_is_a_ws_url() {
        let net = started().await;
        let info = net.connection_info().unwrap();
        assert_eq!(info.transport, TransportKind::WEBSOCKET);
        assert!(info.endpoint.starts_with("ws://127.0.0.1:"));
    }

    #[tokio::test]
    async fn connect_and_ping() {
        let a = started().await;
        let b = started().await;
        let conn = a.connect(&b.connection_info().unwrap()).await.unwrap();
        conn.ping(Duration::from_secs(2)).await.unwrap();
        assert_eq!(a.connections().len(), 1);
        assert_eq!(b.stats()["pings_answered"], 1);
    }

    #[tokio::test]
    async fn max_size_frame_keeps_link_alive() {
        let a = started().await;
        let b = started().await;
        let conn = a.connect(&b.connection_info().unwrap()).await.unwrap();

        let bulk = Msg::new("bulk", vec![7; MAX_PAYLOAD]).unwrap();
        assert_eq!(bulk.frame_len(), HEADER_LEN + MAX_PAYLOAD);
        conn.send_msg(&bulk).unwrap();
        conn.ping(Duration::from_secs(10)).await.unwrap();
        assert!(conn.is_open());
        assert_eq!(b.stats()["unknown_messages"], 1);
        assert_eq!(b.stats()["malformed_messages"], 0);
    }

    #[tokio::test]
    async fn stalled_handshake_times_out() {
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();
        let holder = tokio::spawn(async move {
            let (_stream, _) = silent.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let options = LinkOptions {
            connect_timeout: Duration::from_millis(200),
            ..LinkOptions::default()
        };
        let a = WebSocketNetwork::new(WebSocketConfig::ephemeral(), options);
        a.initialize().await.unwrap();
        let info = ConnectionInfo::new(TransportKind::WEBSOCKET, format!("ws://{addr}"));
        let Err(ConnectError::Timeout { endpoint, after }) = a.connect(&info).await else {
            panic!("expected a connect timeout");
        };
        assert_eq!(endpoint, format!("ws://{addr}"));
        assert_eq!(after, Duration::from_millis(200));
        assert!(a.connections().is_empty());
        holder.abort();
    }

    #[tokio::test]
    async fn rejects_non_ws_endpoints() {
        let a = started().await;
        let info = ConnectionInfo::new(TransportKind::WEBSOCKET, "127.0.0.1:80");
        assert!(matches!(
            a.connect(&info).await,
            Err(ConnectError::MalformedInfo(_))
        ));
    }

    #[tokio::test]
    async fn refused_dial() {
        let a = started().await;
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let info = ConnectionInfo::new(TransportKind::WEBSOCKET, format!("ws://127.0.0.1:{port}"));
        assert!(matches!(
            a.connect(&info).await,
            Err(ConnectError::Refused { .. })
        ));
    }

    #[tokio::test]
    async fn close_twice() {
        let a = started().await;
        let b = started().await;
        a.connect(&b.connection_info().unwrap()).await.unwrap();
        a.close().await.unwrap();
        a.close().await.unwrap();
        assert!(a.connections().is_empty());
    }
}
