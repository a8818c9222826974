//! Ed25519 key generation.

use datt_types::{KeyPair, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

/// Generate a fresh key pair from the OS random source.
pub fn generate_keypair() -> KeyPair {
    keypair_from_signing_key(SigningKey::generate(&mut OsRng))
}

/// Derive a key pair deterministically from a 32-byte seed.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_from_signing_key(SigningKey::from_bytes(seed))
}

/// Derive the public key belonging to a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    PublicKey(SigningKey::from_bytes(&private.0).verifying_key().to_bytes())
}

/// Rebuild a full key pair around an existing private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

fn keypair_from_signing_key(signing_key: SigningKey) -> KeyPair {
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}
