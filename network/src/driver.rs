//! Per-connection reader and writer tasks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::SEND_FAILURES;
use crate::{dispatch, Connection, ConnectionEvent, Direction, LinkError, NetworkState};

/// Write half of a link: accepts whole encoded frames.
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError>;

    /// Best-effort orderly shutdown of the write half.
    async fn close(&mut self) {}
}

/// Read half of a link: yields whole encoded frames.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// `Ok(None)` when the remote closed cleanly.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, LinkError>;
}

/// Register a new connection on `state` and start its tasks.
///
/// The writer drains the outbound queue into `sink`. The reader feeds every
/// frame from `source` through [`dispatch::handle_frame`] in arrival order,
/// and on exit removes the connection from the set before announcing
/// `Closed`.
pub fn spawn_connection<S, R>(
    state: &Arc<NetworkState>,
    sink: S,
    source: R,
    remote: String,
    direction: Direction,
) -> Arc<Connection>
where
    S: FrameSink,
    R: FrameSource,
{
    let (conn, outbound) = state.open_connection(remote, direction);
    info!(peer = %conn, direction = ?direction, "connection established");

    tokio::spawn(write_loop(state.clone(), conn.clone(), sink, outbound));
    tokio::spawn(read_loop(state.clone(), conn.clone(), source));
    conn
}

async fn write_loop<S: FrameSink>(
    state: Arc<NetworkState>,
    conn: Arc<Connection>,
    mut sink: S,
    mut outbound: mpsc::Receiver<Arc<[u8]>>,
) {
    let cancel = conn.cancel_token().clone();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send_frame(&frame).await {
                    state.stats().increment(SEND_FAILURES);
                    warn!(peer = %conn, error = %e, "write failed, closing connection");
                    conn.close();
                    break;
                }
            }
        }
    }
    // Dropping the queue makes further sends report Closed.
    drop(outbound);
    sink.close().await;
}

async fn read_loop<R: FrameSource>(state: Arc<NetworkState>, conn: Arc<Connection>, mut source: R) {
    let cancel = conn.cancel_token().clone();
    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break "closed locally".to_string(),
            next = source.next_frame() => match next {
                Ok(Some(frame)) => {
                    dispatch::handle_frame(&state, &conn, &frame);
                }
                Ok(None) => break "closed by remote".to_string(),
                Err(e) => break e.to_string(),
            }
        }
    };

    conn.close();
    if state.release_connection(&conn) {
        conn.emit(ConnectionEvent::Closed);
    }
    debug!(peer = %conn, reason = %reason, "connection ended");
}
