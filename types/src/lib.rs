//! Fundamental types for the datt content network.
//!
//! This crate defines the value types shared across every other crate in the workspace:
//! addresses, anchor block hashes, key material, signatures, timestamps, and transport names.

pub mod address;
pub mod block;
pub mod error;
pub mod hex_serde;
pub mod keys;
pub mod time;
pub mod transport;

pub use address::Address;
pub use block::BlockHash;
pub use error::TypesError;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use time::Timestamp;
pub use transport::TransportKind;
