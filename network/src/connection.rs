//! One live link to one remote peer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use datt_messages::{Command, Msg, MsgPing, TypedMessage};
use datt_types::{Timestamp, TransportKind};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{LivenessError, SendError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const EVENT_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Something that happened on a connection, in arrival order.
#[derive(Clone, Debug)]
pub enum ConnectionEvent {
    Msg(Msg),
    Closed,
}

/// A message received by a transport, with the connection it arrived on.
#[derive(Clone, Debug)]
pub struct Inbound {
    pub connection: Arc<Connection>,
    pub msg: Msg,
}

/// Handle to a live connection.
///
/// Sending only enqueues the encoded frame; a writer task owned by the
/// transport drains the queue, so a slow peer never blocks the sender.
pub struct Connection {
    id: u64,
    transport: TransportKind,
    remote: String,
    direction: Direction,
    connected_at: Timestamp,
    outbound: mpsc::Sender<Arc<[u8]>>,
    events: broadcast::Sender<ConnectionEvent>,
    cancel: CancellationToken,
}

impl Connection {
    /// Create a connection and the receiving end of its outbound queue.
    ///
    /// Transports hand the receiver to their writer task. Cancelling
    /// `cancel` closes the connection.
    pub fn new(
        transport: TransportKind,
        remote: impl Into<String>,
        direction: Direction,
        outbound_queue: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Arc<[u8]>>) {
        let (outbound, rx) = mpsc::channel(outbound_queue.max(1));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let conn = Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            transport,
            remote: remote.into(),
            direction,
            connected_at: Timestamp::now(),
            outbound,
            events,
            cancel,
        });
        (conn, rx)
    }

    /// Process-unique id; later connections have larger ids.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn transport(&self) -> &TransportKind {
        &self.transport
    }

    /// Remote endpoint as reported by the transport.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Enqueue an already encoded frame.
    pub fn send_bytes(&self, frame: Arc<[u8]>) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    pub fn send_msg(&self, msg: &Msg) -> Result<(), SendError> {
        self.send_bytes(msg.to_bytes().into())
    }

    /// Stream of messages received on this connection from now on, pings
    /// included. Pings never reach the transport's inbound stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Send a ping and wait for the pong on this connection.
    ///
    /// Only one outstanding ping per connection is assumed; the first pong
    /// to arrive answers it. Returns the round-trip time.
    pub async fn ping(&self, timeout: Duration) -> Result<Duration, LivenessError> {
        let mut events = self.subscribe();
        let started = Instant::now();
        self.send_msg(&MsgPing.to_msg()?)?;

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(ConnectionEvent::Msg(m)) if m.cmd() == Command::Pong.as_str() => {
                        return Ok(started.elapsed());
                    }
                    Ok(ConnectionEvent::Msg(_)) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Ok(ConnectionEvent::Closed) | Err(broadcast::error::RecvError::Closed) => {
                        return Err(LivenessError::Closed);
                    }
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| LivenessError::Timeout(timeout))?
    }

    /// Ask the transport to tear this connection down. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the connection has been closed from either side.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("transport", &self.transport)
            .field("remote", &self.remote)
            .field("direction", &self.direction)
            .field("open", &self.is_open())
            .finish()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}({})", self.transport, self.id, self.remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datt_messages::MsgPong;

    fn detached(queue: usize) -> (Arc<Connection>, mpsc::Receiver<Arc<[u8]>>) {
        Connection::new(
            TransportKind::SOCKET,
            "test",
            Direction::Outbound,
            queue,
            CancellationToken::new(),
        )
    }

    #[test]
    fn ids_increase() {
        let (a, _ra) = detached(1);
        let (b, _rb) = detached(1);
        assert!(b.id() > a.id());
    }

    #[test]
    fn full_queue_and_closed_are_distinct() {
        let (conn, rx) = detached(1);
        let msg = MsgPing.to_msg().unwrap();
        conn.send_msg(&msg).unwrap();
        assert_eq!(conn.send_msg(&msg), Err(SendError::QueueFull));
        drop(rx);
        assert_eq!(conn.send_msg(&msg), Err(SendError::Closed));
    }

    #[test]
    fn close_is_idempotent_and_blocks_sends() {
        let (conn, _rx) = detached(4);
        conn.close();
        conn.close();
        assert!(!conn.is_open());
        assert_eq!(
            conn.send_msg(&MsgPing.to_msg().unwrap()),
            Err(SendError::Closed)
        );
    }

    #[tokio::test]
    async fn ping_resolves_on_pong() {
        let (conn, mut rx) = detached(4);
        let responder = {
            let conn = conn.clone();
            tokio::spawn(async move {
                let frame = rx.recv().await.unwrap();
                assert_eq!(Msg::from_bytes(&frame).unwrap().cmd(), "ping");
                conn.emit(ConnectionEvent::Msg(MsgPong.to_msg().unwrap()));
            })
        };
        conn.ping(Duration::from_secs(2)).await.unwrap();
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn ping_times_out_without_pong() {
        let (conn, _rx) = detached(4);
        let err = conn.ping(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, LivenessError::Timeout(_)));
    }

    #[tokio::test]
    async fn ping_reports_close() {
        let (conn, _rx) = detached(4);
        let closer = conn.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.emit(ConnectionEvent::Closed);
        });
        let err = conn.ping(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, LivenessError::Closed));
    }
}
