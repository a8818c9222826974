//! Handling of one inbound frame.

use std::sync::Arc;

use datt_messages::{Message, Msg, MsgPong, TypedMessage};
use tracing::{debug, trace, warn};

use crate::state::{
    MALFORMED_MESSAGES, MESSAGES_RECEIVED, PINGS_ANSWERED, SEND_FAILURES, UNKNOWN_MESSAGES,
};
use crate::{Connection, ConnectionEvent, Inbound, NetworkState};

/// What became of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Delivered,
    AnsweredPing,
    Unknown,
    Malformed,
}

/// Decode `frame` and act on it.
///
/// Pings are answered on the same connection and reach only the connection's
/// subscribers. Unknown and malformed messages are counted and dropped.
/// Everything else goes to the connection's subscribers and to the
/// transport's inbound stream.
pub fn handle_frame(state: &NetworkState, conn: &Arc<Connection>, frame: &[u8]) -> Disposition {
    state.stats().increment(MESSAGES_RECEIVED);

    let msg = match Msg::from_bytes(frame) {
        Ok(msg) => msg,
        Err(e) => {
            state.stats().increment(MALFORMED_MESSAGES);
            debug!(peer = %conn, error = %e, "dropping undecodable frame");
            return Disposition::Malformed;
        }
    };
    handle_msg(state, conn, msg)
}

/// As [`handle_frame`], for transports that deliver decoded messages.
pub fn handle_msg(state: &NetworkState, conn: &Arc<Connection>, msg: Msg) -> Disposition {
    match Message::from_msg(&msg) {
        Ok(Message::Ping(_)) => {
            conn.emit(ConnectionEvent::Msg(msg));
            let sent = MsgPong
                .to_msg()
                .map_err(|e| e.to_string())
                .and_then(|pong| conn.send_msg(&pong).map_err(|e| e.to_string()));
            match sent {
                Ok(()) => {
                    state.stats().increment(PINGS_ANSWERED);
                    trace!(peer = %conn, "answered ping");
                }
                Err(e) => {
                    state.stats().increment(SEND_FAILURES);
                    warn!(peer = %conn, error = %e, "failed to answer ping");
                }
            }
            Disposition::AnsweredPing
        }
        Ok(Message::Unknown { cmd, .. }) => {
            state.stats().increment(UNKNOWN_MESSAGES);
            debug!(peer = %conn, cmd = %cmd, "dropping unknown message");
            Disposition::Unknown
        }
        Ok(_) => {
            trace!(peer = %conn, cmd = msg.cmd(), "delivering message");
            conn.emit(ConnectionEvent::Msg(msg.clone()));
            state.publish(Inbound {
                connection: conn.clone(),
                msg,
            });
            Disposition::Delivered
        }
        Err(e) => {
            state.stats().increment(MALFORMED_MESSAGES);
            debug!(peer = %conn, cmd = msg.cmd(), error = %e, "dropping malformed message");
            Disposition::Malformed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, LinkOptions};
    use datt_messages::MsgPing;
    use datt_types::TransportKind;

    fn setup() -> (
        Arc<NetworkState>,
        Arc<Connection>,
        tokio::sync::mpsc::Receiver<Arc<[u8]>>,
    ) {
        let state = NetworkState::new(TransportKind::SOCKET, LinkOptions::default());
        let (conn, rx) = state.open_connection("peer", Direction::Inbound);
        (state, conn, rx)
    }

    #[test]
    fn ping_is_answered_with_pong_on_same_connection() {
        let (state, conn, mut rx) = setup();
        let mut inbound = state.subscribe_inbound();
        let frame = MsgPing.to_msg().unwrap().to_bytes();

        assert_eq!(handle_frame(&state, &conn, &frame), Disposition::AnsweredPing);
        let reply = rx.try_recv().unwrap();
        assert_eq!(Msg::from_bytes(&reply).unwrap().cmd(), "pong");
        assert!(inbound.try_recv().is_err());
        assert_eq!(state.stats().get(PINGS_ANSWERED), 1);
    }

    #[test]
    fn ping_reaches_connection_subscribers() {
        let (state, conn, _rx) = setup();
        let mut events = conn.subscribe();
        let frame = MsgPing.to_msg().unwrap().to_bytes();

        assert_eq!(handle_frame(&state, &conn, &frame), Disposition::AnsweredPing);
        match events.try_recv().unwrap() {
            ConnectionEvent::Msg(m) => assert_eq!(m.cmd(), "ping"),
            ConnectionEvent::Closed => panic!("expected the ping"),
        }
    }

    #[test]
    fn unknown_is_counted_not_delivered() {
        let (state, conn, _rx) = setup();
        let mut inbound = state.subscribe_inbound();
        let frame = Msg::new("getaddr", vec![]).unwrap().to_bytes();

        assert_eq!(handle_frame(&state, &conn, &frame), Disposition::Unknown);
        assert!(inbound.try_recv().is_err());
        assert_eq!(state.stats().get(UNKNOWN_MESSAGES), 1);
        assert_eq!(state.stats().get(MESSAGES_RECEIVED), 1);
    }

    #[test]
    fn malformed_frames_and_payloads_are_counted() {
        let (state, conn, _rx) = setup();
        assert_eq!(handle_frame(&state, &conn, b"junk"), Disposition::Malformed);
        let bad = Msg::new("contentauth", b"{}".to_vec()).unwrap().to_bytes();
        assert_eq!(handle_frame(&state, &conn, &bad), Disposition::Malformed);
        assert_eq!(state.stats().get(MALFORMED_MESSAGES), 2);
    }

    #[test]
    fn pong_is_delivered_to_both_streams() {
        let (state, conn, _rx) = setup();
        let mut inbound = state.subscribe_inbound();
        let mut events = conn.subscribe();
        let frame = MsgPong.to_msg().unwrap().to_bytes();

        assert_eq!(handle_frame(&state, &conn, &frame), Disposition::Delivered);
        let got = inbound.try_recv().unwrap();
        assert_eq!(got.connection.id(), conn.id());
        assert_eq!(got.msg.cmd(), "pong");
        assert!(matches!(events.try_recv().unwrap(), ConnectionEvent::Msg(_)));
    }
}
