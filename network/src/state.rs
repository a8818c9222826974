//! Runtime state shared by a transport and its connection tasks.

use std::sync::Arc;

use datt_types::TransportKind;
use datt_utils::StatsCounter;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{Connection, ConnectionSet, Direction, Inbound, LinkOptions};

pub const MESSAGES_RECEIVED: &str = "messages_received";
pub const UNKNOWN_MESSAGES: &str = "unknown_messages";
pub const MALFORMED_MESSAGES: &str = "malformed_messages";
pub const PINGS_ANSWERED: &str = "pings_answered";
pub const CONNECTIONS_OPENED: &str = "connections_opened";
pub const CONNECTIONS_CLOSED: &str = "connections_closed";
pub const SEND_FAILURES: &str = "send_failures";

/// Counters every transport maintains.
pub const COUNTERS: [&str; 7] = [
    MESSAGES_RECEIVED,
    UNKNOWN_MESSAGES,
    MALFORMED_MESSAGES,
    PINGS_ANSWERED,
    CONNECTIONS_OPENED,
    CONNECTIONS_CLOSED,
    SEND_FAILURES,
];

/// Connection set, inbound stream, counters and shutdown token of one transport.
///
/// Only the owning transport and its connection tasks mutate the set.
pub struct NetworkState {
    kind: TransportKind,
    options: LinkOptions,
    connections: ConnectionSet,
    inbound: broadcast::Sender<Inbound>,
    stats: StatsCounter,
    cancel: CancellationToken,
}

impl NetworkState {
    pub fn new(kind: TransportKind, options: LinkOptions) -> Arc<Self> {
        let (inbound, _) = broadcast::channel(options.inbound_capacity.max(1));
        Arc::new(Self {
            kind,
            options,
            connections: ConnectionSet::new(),
            inbound,
            stats: StatsCounter::new(&COUNTERS),
            cancel: CancellationToken::new(),
        })
    }

    pub fn kind(&self) -> &TransportKind {
        &self.kind
    }

    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    pub fn subscribe_inbound(&self) -> broadcast::Receiver<Inbound> {
        self.inbound.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancelled when the transport closes; children of it end their tasks.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Create a connection owned by this transport and add it to the set.
    pub fn open_connection(
        &self,
        remote: impl Into<String>,
        direction: Direction,
    ) -> (Arc<Connection>, tokio::sync::mpsc::Receiver<Arc<[u8]>>) {
        let (conn, rx) = Connection::new(
            self.kind.clone(),
            remote,
            direction,
            self.options.outbound_queue,
            self.cancel.child_token(),
        );
        self.connections.insert(conn.clone());
        self.stats.increment(CONNECTIONS_OPENED);
        (conn, rx)
    }

    /// Remove a connection after it has ended. Returns whether it was present.
    pub fn release_connection(&self, conn: &Connection) -> bool {
        let removed = self.connections.remove(conn.id());
        if removed {
            self.stats.increment(CONNECTIONS_CLOSED);
        }
        removed
    }

    pub(crate) fn publish(&self, inbound: Inbound) {
        // No subscribers is fine.
        let _ = self.inbound.send(inbound);
    }

    /// Close every connection and stop the transport. Returns `false` if it was already shut down.
    pub fn shutdown(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        for conn in self.connections.drain() {
            conn.close();
            conn.emit(crate::ConnectionEvent::Closed);
            self.stats.increment(CONNECTIONS_CLOSED);
        }
        true
    }
}
