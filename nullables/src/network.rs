//! Nullable network: a transport whose connections go nowhere.
//!
//! Connections are real [`Connection`] handles, but nothing drains their
//! outbound queues until a test asks for [`NullNetwork::sent`]. Breaking a
//! connection drops its queue receiver, so later sends on it fail with
//! `SendError::Closed` exactly as they would after a dead writer task.

use std::collections::BTreeMap;
use std::future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use datt_network::{
    ConnectError, Connection, ConnectionInfo, Direction, Inbound, Network, NetworkError,
};
use datt_messages::Msg;
use datt_types::TransportKind;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::lock;

const DEFAULT_QUEUE: usize = 64;

enum InitBehavior {
    Succeed,
    Fail(String),
    Hang,
}

struct Link {
    connection: Arc<Connection>,
    rx: Option<mpsc::Receiver<Arc<[u8]>>>,
    sent: Vec<Arc<[u8]>>,
}

pub struct NullNetwork {
    kind: TransportKind,
    outbound_queue: usize,
    links: Mutex<Vec<Link>>,
    inbound: broadcast::Sender<Inbound>,
    cancel: CancellationToken,
    initialized: AtomicBool,
    init_behavior: Mutex<InitBehavior>,
    close_failure: Mutex<Option<String>>,
    connect_attempts: AtomicUsize,
}

impl NullNetwork {
    pub fn new(kind: TransportKind) -> Self {
        let (inbound, _) = broadcast::channel(256);
        Self {
            kind,
            outbound_queue: DEFAULT_QUEUE,
            links: Mutex::new(Vec::new()),
            inbound,
            cancel: CancellationToken::new(),
            initialized: AtomicBool::new(false),
            init_behavior: Mutex::new(InitBehavior::Succeed),
            close_failure: Mutex::new(None),
            connect_attempts: AtomicUsize::new(0),
        }
    }

    pub fn with_outbound_queue(mut self, frames: usize) -> Self {
        self.outbound_queue = frames;
        self
    }

    /// Make the next `initialize` fail with `reason`.
    pub fn fail_initialize(&self, reason: &str) {
        *lock(&self.init_behavior) = InitBehavior::Fail(reason.to_string());
    }

    /// Make `initialize` never complete.
    pub fn hang_initialize(&self) {
        *lock(&self.init_behavior) = InitBehavior::Hang;
    }

    /// Make `close` report `reason` (it still closes everything).
    pub fn fail_close(&self, reason: &str) {
        *lock(&self.close_failure) = Some(reason.to_string());
    }

    /// Add an accepted connection, as if a peer had dialled in.
    pub fn add_connection(&self) -> Arc<Connection> {
        let index = lock(&self.links).len();
        self.open(format!("null-peer-{index}"), Direction::Inbound)
    }

    fn open(&self, remote: String, direction: Direction) -> Arc<Connection> {
        let (connection, rx) = Connection::new(
            self.kind.clone(),
            remote,
            direction,
            self.outbound_queue,
            self.cancel.child_token(),
        );
        lock(&self.links).push(Link {
            connection: connection.clone(),
            rx: Some(rx),
            sent: Vec::new(),
        });
        connection
    }

    /// Drop connection `index`'s queue receiver so every later send fails.
    pub fn break_connection(&self, index: usize) {
        if let Some(link) = lock(&self.links).get_mut(index) {
            link.rx = None;
        }
    }

    /// Every frame queued on connection `index` so far, oldest first.
    pub fn sent(&self, index: usize) -> Vec<Arc<[u8]>> {
        let mut links = lock(&self.links);
        let Some(link) = links.get_mut(index) else {
            return Vec::new();
        };
        if let Some(rx) = link.rx.as_mut() {
            while let Ok(frame) = rx.try_recv() {
                link.sent.push(frame);
            }
        }
        link.sent.clone()
    }

    /// Publish `msg` as if it had arrived on connection `index`.
    pub fn deliver(&self, index: usize, msg: Msg) -> bool {
        let connection = match lock(&self.links).get(index) {
            Some(link) => link.connection.clone(),
            None => return false,
        };
        self.inbound.send(Inbound { connection, msg }).is_ok()
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[async_trait]
impl Network for NullNetwork {
    fn kind(&self) -> TransportKind {
        self.kind.clone()
    }

    async fn initialize(&self) -> Result<(), NetworkError> {
        if self.is_closed() {
            return Err(NetworkError::Closed(self.kind.clone()));
        }
        let failure = match &*lock(&self.init_behavior) {
            InitBehavior::Succeed => None,
            InitBehavior::Fail(reason) => Some(Some(reason.clone())),
            InitBehavior::Hang => Some(None),
        };
        match failure {
            None => {
                self.initialized.store(true, Ordering::SeqCst);
                Ok(())
            }
            Some(Some(reason)) => Err(NetworkError::TransportInit {
                transport: self.kind.clone(),
                reason,
            }),
            Some(None) => future::pending().await,
        }
    }

    fn connection_info(&self) -> Result<ConnectionInfo, NetworkError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(NetworkError::NotInitialized(self.kind.clone()));
        }
        Ok(ConnectionInfo::new(self.kind.clone(), format!("null://{}", self.kind)))
    }

    async fn connect(&self, remote: &ConnectionInfo) -> Result<Arc<Connection>, ConnectError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if remote.transport != self.kind {
            return Err(ConnectError::TransportMismatch {
                expected: self.kind.clone(),
                actual: remote.transport.clone(),
            });
        }
        if self.is_closed() {
            return Err(ConnectError::Closed);
        }
        Ok(self.open(remote.endpoint.clone(), Direction::Outbound))
    }

    fn connections(&self) -> Vec<Arc<Connection>> {
        lock(&self.links)
            .iter()
            .filter(|l| l.connection.is_open())
            .map(|l| l.connection.clone())
            .collect()
    }

    fn subscribe_inbound(&self) -> broadcast::Receiver<Inbound> {
        self.inbound.subscribe()
    }

    fn stats(&self) -> BTreeMap<&'static str, u64> {
        let opened = lock(&self.links).len() as u64;
        BTreeMap::from([("connections_opened", opened)])
    }

    async fn close(&self) -> Result<(), NetworkError> {
        self.cancel.cancel();
        match lock(&self.close_failure).take() {
            Some(reason) => Err(NetworkError::Shutdown {
                transport: self.kind.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datt_messages::{MsgPing, TypedMessage};
    use datt_network::SendError;

    #[test]
    fn sent_frames_are_recorded_in_order() {
        let net = NullNetwork::new(TransportKind::SOCKET);
        let conn = net.add_connection();
        conn.send_bytes(Arc::from(&b"one"[..])).unwrap();
        conn.send_bytes(Arc::from(&b"two"[..])).unwrap();
        let sent = net.sent(0);
        assert_eq!(sent.len(), 2);
        assert_eq!(&*sent[1], b"two");
        assert!(net.sent(7).is_empty());
    }

    #[test]
    fn broken_connection_refuses_sends() {
        let net = NullNetwork::new(TransportKind::SOCKET);
        let conn = net.add_connection();
        net.break_connection(0);
        assert_eq!(conn.send_bytes(Arc::from(&b"x"[..])), Err(SendError::Closed));
        assert_eq!(net.connections().len(), 1);
    }

    #[tokio::test]
    async fn close_empties_the_connection_set() {
        let net = NullNetwork::new(TransportKind::WEBSOCKET);
        net.add_connection();
        net.add_connection();
        net.close().await.unwrap();
        net.close().await.unwrap();
        assert!(net.connections().is_empty());
        assert!(matches!(
            net.connect(&ConnectionInfo::new(TransportKind::WEBSOCKET, "x")).await,
            Err(ConnectError::Closed)
        ));
    }

    #[tokio::test]
    async fn info_requires_initialize() {
        let net = NullNetwork::new(TransportKind::SOCKET);
        assert!(net.connection_info().is_err());
        net.initialize().await.unwrap();
        assert_eq!(net.connection_info().unwrap().endpoint, "null://socket");
    }

    #[tokio::test]
    async fn delivered_messages_reach_subscribers() {
        let net = NullNetwork::new(TransportKind::SOCKET);
        net.add_connection();
        let mut rx = net.subscribe_inbound();
        assert!(net.deliver(0, MsgPing.to_msg().unwrap()));
        let inbound = rx.recv().await.unwrap();
        assert_eq!(inbound.msg.cmd(), "ping");
        assert_eq!(inbound.connection.remote(), "null-peer-0");
    }
}
