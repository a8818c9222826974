//! Signing capability for datt.
//!
//! - **Ed25519** for signing and verification
//! - **Blake2b-256** for digests (message checksums, content-auth ids)
//! - Address derivation with `datt_` prefix and base32 encoding

pub mod address;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::{decode_address, derive_address, public_key_of, validate_address};
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
