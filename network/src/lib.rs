//! Transports for datt peers.
//!
//! A [`Network`] owns every [`Connection`] of one transport kind. Two
//! transports ship here:
//!
//! - [`SocketNetwork`]: raw TCP, frames read header-then-payload.
//! - [`WebSocketNetwork`]: one frame per binary WebSocket message.
//!
//! Both share the same connection driver: a writer task draining a bounded
//! outbound queue and a reader task feeding [`dispatch`], which answers
//! pings, drops unknown or malformed messages, and publishes the rest.

pub mod config;
pub mod connection;
pub mod connection_set;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod info;
pub mod network;
pub mod socket;
pub mod state;
pub mod websocket;

pub use config::{LinkOptions, SocketConfig, WebSocketConfig};
pub use connection::{Connection, ConnectionEvent, Direction, Inbound};
pub use connection_set::ConnectionSet;
pub use error::{ConnectError, LinkError, LivenessError, NetworkError, SendError};
pub use info::ConnectionInfo;
pub use network::Network;
pub use socket::SocketNetwork;
pub use state::{NetworkState, COUNTERS};
pub use websocket::WebSocketNetwork;
