//! The coordinator that owns every transport.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use datt_content::ContentAuth;
use datt_messages::{MessageError, Msg, MsgContentAuth, TypedMessage};
use datt_network::{
    ConnectionInfo, Connection, Inbound, Network, SocketNetwork, WebSocketNetwork,
};
use datt_types::TransportKind;
use datt_utils::StatsCounter;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{PeersConfig, PeersError};

pub const BROADCASTS: &str = "broadcasts";
pub const BROADCAST_SENT: &str = "broadcast_sent";
pub const BROADCAST_FAILED: &str = "broadcast_failed";
pub const INBOUND_LAGGED: &str = "inbound_lagged";

pub const COUNTERS: [&str; 4] = [BROADCASTS, BROADCAST_SENT, BROADCAST_FAILED, INBOUND_LAGGED];

const DEFAULT_INBOUND_CAPACITY: usize = 1024;
const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// A new connection and the transport that owns it.
#[derive(Clone)]
pub struct ConnectedPair {
    pub connection: Arc<Connection>,
    pub network: Arc<dyn Network>,
}

/// Outcome of one broadcast. `attempted == sent + failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Owns one network per transport kind.
///
/// The transport list is fixed at construction. Connection sets live in the
/// networks and are read fresh on every broadcast.
pub struct Peers {
    networks: Vec<Arc<dyn Network>>,
    inbound: broadcast::Sender<Inbound>,
    stats: Arc<StatsCounter>,
    init_timeout: Duration,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl Peers {
    /// Build the transports enabled in `config`. Nothing is bound until
    /// [`initialize`](Self::initialize).
    pub fn from_config(config: &PeersConfig) -> Result<Self, PeersError> {
        let options = config.link_options();
        let mut networks: Vec<Arc<dyn Network>> = Vec::new();
        if config.socket.enabled {
            networks.push(Arc::new(SocketNetwork::new(config.socket.clone(), options)));
        }
        if config.websocket.enabled {
            networks.push(Arc::new(WebSocketNetwork::new(config.websocket.clone(), options)));
        }
        if networks.is_empty() {
            return Err(PeersError::Config("no transport enabled".into()));
        }
        let mut peers = Self::with_networks(networks)?;
        peers.init_timeout = config.init_timeout();
        peers.inbound = broadcast::channel(config.inbound_capacity.max(1)).0;
        Ok(peers)
    }

    /// Take ownership of already-built transports. Each kind may appear once.
    pub fn with_networks(networks: Vec<Arc<dyn Network>>) -> Result<Self, PeersError> {
        let mut seen = Vec::with_capacity(networks.len());
        for network in &networks {
            let kind = network.kind();
            if seen.contains(&kind) {
                return Err(PeersError::DuplicateTransport(kind));
            }
            seen.push(kind);
        }
        let (inbound, _) = broadcast::channel(DEFAULT_INBOUND_CAPACITY);
        Ok(Self {
            networks,
            inbound,
            stats: Arc::new(StatsCounter::new(&COUNTERS)),
            init_timeout: DEFAULT_INIT_TIMEOUT,
            forwarders: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Initialize every transport concurrently, each bounded by the init
    /// timeout, then start forwarding their inbound streams.
    ///
    /// Fails with the first failing transport in registration order. Calling
    /// it again after success re-runs the (idempotent) transport setup only.
    pub async fn initialize(&self) -> Result<(), PeersError> {
        if self.cancel.is_cancelled() {
            return Err(PeersError::Closed);
        }
        let timeout = self.init_timeout;
        let results = join_all(self.networks.iter().map(|network| async move {
            let transport = network.kind();
            match tokio::time::timeout(timeout, network.initialize()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(PeersError::TransportInit { transport, source }),
                Err(_) => Err(PeersError::InitTimeout {
                    transport,
                    after: timeout,
                }),
            }
        }))
        .await;

        for result in results {
            if let Err(e) = result {
                warn!(error = %e, "peer initialization failed");
                return Err(e);
            }
        }

        self.start_forwarders();
        info!(transports = self.networks.len(), "peers initialized");
        Ok(())
    }

    fn start_forwarders(&self) {
        let mut forwarders = self.forwarders.lock().unwrap_or_else(|e| e.into_inner());
        if !forwarders.is_empty() {
            return;
        }
        for network in &self.networks {
            let mut rx = network.subscribe_inbound();
            let tx = self.inbound.clone();
            let cancel = self.cancel.child_token();
            let stats = self.stats.clone();
            let transport = network.kind();
            forwarders.push(tokio::spawn(async move {
                loop {
                    let inbound = tokio::select! {
                        _ = cancel.cancelled() => break,
                        r = rx.recv() => r,
                    };
                    match inbound {
                        Ok(inbound) => {
                            // No subscribers is fine.
                            let _ = tx.send(inbound);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            stats.add(INBOUND_LAGGED, n);
                            warn!(%transport, skipped = n, "inbound forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                debug!(%transport, "inbound forwarder stopped");
            }));
        }
    }

    /// Dial `remote` through the transport named by `transport`, or by the
    /// descriptor itself when `None`.
    pub async fn connect(
        &self,
        remote: &ConnectionInfo,
        transport: Option<&TransportKind>,
    ) -> Result<ConnectedPair, PeersError> {
        if self.cancel.is_cancelled() {
            return Err(PeersError::Closed);
        }
        let kind = transport.unwrap_or(&remote.transport);
        let network = self
            .network(kind)
            .ok_or_else(|| PeersError::UnknownTransport(kind.to_string()))?;
        let connection = network.connect(remote).await?;
        info!(peer = %connection, endpoint = %remote.endpoint, "connected");
        Ok(ConnectedPair {
            connection,
            network,
        })
    }

    /// Encode `msg` once and queue it on every live connection of every
    /// transport.
    ///
    /// Never waits for delivery. A connection that refuses the frame is
    /// counted in the report and skipped; the others still receive it.
    pub fn broadcast_msg(&self, msg: &Msg) -> BroadcastReport {
        let frame: Arc<[u8]> = msg.to_bytes().into();
        let mut report = BroadcastReport::default();

        for network in &self.networks {
            for conn in network.connections() {
                report.attempted += 1;
                match conn.send_bytes(frame.clone()) {
                    Ok(()) => report.sent += 1,
                    Err(e) => {
                        report.failed += 1;
                        debug!(peer = %conn, error = %e, "broadcast send failed");
                    }
                }
            }
        }

        self.stats.increment(BROADCASTS);
        self.stats.add(BROADCAST_SENT, report.sent as u64);
        self.stats.add(BROADCAST_FAILED, report.failed as u64);
        debug!(
            cmd = msg.cmd(),
            attempted = report.attempted,
            failed = report.failed,
            "broadcast"
        );
        report
    }

    /// Wrap `content_auth` in a `contentauth` message and broadcast it.
    pub fn broadcast_content_auth(
        &self,
        content_auth: &ContentAuth,
    ) -> Result<BroadcastReport, MessageError> {
        let msg = MsgContentAuth::from_content_auth(content_auth.clone()).to_msg()?;
        Ok(self.broadcast_msg(&msg))
    }

    pub fn network(&self, kind: &TransportKind) -> Option<Arc<dyn Network>> {
        self.networks.iter().find(|n| &n.kind() == kind).cloned()
    }

    pub fn networks(&self) -> &[Arc<dyn Network>] {
        &self.networks
    }

    /// Connection info of every initialized transport.
    pub fn connection_infos(&self) -> Vec<ConnectionInfo> {
        self.networks
            .iter()
            .filter_map(|n| n.connection_info().ok())
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.networks.iter().map(|n| n.connections().len()).sum()
    }

    /// Inbound messages from every transport, per-connection order preserved.
    pub fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.inbound.subscribe()
    }

    /// Peers counters plus each transport's counters prefixed with its kind.
    pub fn stats(&self) -> BTreeMap<String, u64> {
        let mut out: BTreeMap<String, u64> = self
            .stats
            .snapshot()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        for network in &self.networks {
            let kind = network.kind();
            for (name, value) in network.stats() {
                out.insert(format!("{kind}.{name}"), value);
            }
        }
        out
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every transport. Idempotent; collects every failure instead of
    /// stopping at the first.
    pub async fn close(&self) -> Result<(), PeersError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.cancel.cancel();
        let forwarders: Vec<_> = self
            .forwarders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in forwarders {
            handle.abort();
        }

        let results = join_all(
            self.networks
                .iter()
                .map(|n| async move { (n.kind(), n.close().await) }),
        )
        .await;
        let failures: Vec<_> = results
            .into_iter()
            .filter_map(|(kind, r)| r.err().map(|e| (kind, e)))
            .collect();

        if failures.is_empty() {
            info!("peers closed");
            Ok(())
        } else {
            for (kind, e) in &failures {
                warn!(transport = %kind, error = %e, "transport close failed");
            }
            Err(PeersError::Close(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datt_messages::MsgPing;
    use datt_network::{NetworkError, SendError};
    use datt_nullables::NullNetwork;

    fn ping() -> Msg {
        MsgPing.to_msg().unwrap()
    }

    #[test]
    fn duplicate_transports_rejected() {
        let a: Arc<dyn Network> = Arc::new(NullNetwork::new(TransportKind::SOCKET));
        let b: Arc<dyn Network> = Arc::new(NullNetwork::new(TransportKind::SOCKET));
        assert!(matches!(
            Peers::with_networks(vec![a, b]),
            Err(PeersError::DuplicateTransport(k)) if k == TransportKind::SOCKET
        ));
    }

    #[test]
    fn from_config_requires_a_transport() {
        let mut config = PeersConfig::ephemeral();
        config.socket.enabled = false;
        config.websocket.enabled = false;
        assert!(matches!(Peers::from_config(&config), Err(PeersError::Config(_))));
    }

    #[tokio::test]
    async fn broadcast_isolates_each_failing_connection() {
        const N: usize = 5;
        for k in 0..N {
            let net = Arc::new(NullNetwork::new(TransportKind::SOCKET));
            for _ in 0..N {
                net.add_connection();
            }
            net.break_connection(k);
            let peers = Peers::with_networks(vec![net.clone() as Arc<dyn Network>]).unwrap();

            let report = peers.broadcast_msg(&ping());
            assert_eq!(report, BroadcastReport { attempted: N, sent: N - 1, failed: 1 });
            for i in 0..N {
                let expected = usize::from(i != k);
                assert_eq!(net.sent(i).len(), expected, "connection {i} with {k} broken");
            }
            assert_eq!(peers.stats()["broadcast_failed"], 1);
        }
    }

    #[tokio::test]
    async fn broadcast_spans_transports_and_sees_new_connections() {
        let socket = Arc::new(NullNetwork::new(TransportKind::SOCKET));
        let ws = Arc::new(NullNetwork::new(TransportKind::WEBSOCKET));
        let peers = Peers::with_networks(vec![
            socket.clone() as Arc<dyn Network>,
            ws.clone() as Arc<dyn Network>,
        ])
        .unwrap();

        assert_eq!(peers.broadcast_msg(&ping()).attempted, 0);

        socket.add_connection();
        ws.add_connection();
        ws.add_connection();
        let report = peers.broadcast_msg(&ping());
        assert_eq!(report.sent, 3);
        assert_eq!(peers.connection_count(), 3);
        assert_eq!(ws.sent(1)[0].as_ref(), ping().to_bytes().as_slice());
    }

    #[tokio::test]
    async fn unknown_transport_connects_nothing() {
        let net = Arc::new(NullNetwork::new(TransportKind::SOCKET));
        let peers = Peers::with_networks(vec![net.clone() as Arc<dyn Network>]).unwrap();
        let info = ConnectionInfo::new(TransportKind::new("webrtc"), "anything");

        let err = peers.connect(&info, None).await.err().unwrap();
        assert!(matches!(err, PeersError::UnknownTransport(k) if k == "webrtc"));

        let err = peers
            .connect(&info, Some(&TransportKind::WEBSOCKET))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PeersError::UnknownTransport(_)));
        assert_eq!(peers.connection_count(), 0);
        assert_eq!(net.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn connect_returns_owning_network() {
        let net = Arc::new(NullNetwork::new(TransportKind::WEBSOCKET));
        let peers = Peers::with_networks(vec![net.clone() as Arc<dyn Network>]).unwrap();
        let info = ConnectionInfo::new(TransportKind::WEBSOCKET, "ws://peer");

        let pair = peers.connect(&info, None).await.unwrap();
        assert_eq!(pair.network.kind(), TransportKind::WEBSOCKET);
        assert_eq!(pair.connection.remote(), "ws://peer");
        assert_eq!(peers.connection_count(), 1);
    }

    #[tokio::test]
    async fn initialize_reports_failing_transport() {
        let good = Arc::new(NullNetwork::new(TransportKind::SOCKET));
        let bad = Arc::new(NullNetwork::new(TransportKind::WEBSOCKET));
        bad.fail_initialize("port in use");
        let peers = Peers::with_networks(vec![
            good as Arc<dyn Network>,
            bad as Arc<dyn Network>,
        ])
        .unwrap();

        let err = peers.initialize().await.unwrap_err();
        assert_eq!(err.failed_transport(), Some(&TransportKind::WEBSOCKET));
        assert!(matches!(
            err,
            PeersError::TransportInit { source: NetworkError::TransportInit { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn hung_initialize_times_out() {
        let slow = Arc::new(NullNetwork::new(TransportKind::SOCKET));
        slow.hang_initialize();
        let peers = Peers::with_networks(vec![slow as Arc<dyn Network>])
            .unwrap()
            .with_init_timeout(Duration::from_millis(50));

        assert!(matches!(
            peers.initialize().await,
            Err(PeersError::InitTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_aggregates() {
        let a = Arc::new(NullNetwork::new(TransportKind::SOCKET));
        let b = Arc::new(NullNetwork::new(TransportKind::WEBSOCKET));
        a.add_connection();
        a.fail_close("stuck");
        b.fail_close("stuck too");
        let peers = Peers::with_networks(vec![
            a.clone() as Arc<dyn Network>,
            b.clone() as Arc<dyn Network>,
        ])
        .unwrap();
        peers.initialize().await.unwrap();

        match peers.close().await {
            Err(PeersError::Close(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("expected aggregated close failure, got {other:?}"),
        }
        assert!(a.is_closed() && b.is_closed());
        assert_eq!(peers.connection_count(), 0);

        peers.close().await.unwrap();
        assert!(matches!(
            peers.connect(&ConnectionInfo::new(TransportKind::SOCKET, "x"), None).await,
            Err(PeersError::Closed)
        ));
    }

    #[tokio::test]
    async fn queue_full_counts_as_failure() {
        let net = Arc::new(NullNetwork::new(TransportKind::SOCKET).with_outbound_queue(1));
        net.add_connection();
        let peers = Peers::with_networks(vec![net.clone() as Arc<dyn Network>]).unwrap();

        assert_eq!(peers.broadcast_msg(&ping()).sent, 1);
        let report = peers.broadcast_msg(&ping());
        assert_eq!(report.failed, 1);
        assert_eq!(
            net.connections()[0].send_bytes(Arc::from(&b"x"[..])),
            Err(SendError::QueueFull)
        );
    }
}
