//! Peer coordination for datt.
//!
//! [`Peers`] owns one [`Network`](datt_network::Network) per transport kind,
//! initialises them together, dials through the right one, fans every
//! inbound message into a single stream, and broadcasts a message to every
//! live connection on every transport.
//!
//! [`ContentArchive`] keeps sent and received content auths in a
//! [`DocumentStore`](datt_store::DocumentStore).

pub mod archive;
pub mod config;
pub mod error;
pub mod peers;

pub use archive::{archive_id, ArchivedContent, ContentArchive};
pub use config::PeersConfig;
pub use error::PeersError;
pub use peers::{BroadcastReport, ConnectedPair, Peers, COUNTERS};
