//! Key material for signing identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "crate::hex_serde")] pub [u8; 32]);

/// A 32-byte Ed25519 private key (seed).
///
/// Deliberately not `Debug`, `Serialize`, or `Clone`. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(pub [u8; 32]);

/// A 64-byte Ed25519 signature, serialized as hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "crate::hex_serde")] pub [u8; 64]);

/// An Ed25519 key pair.
///
/// Construct with `datt_crypto::generate_keypair()` or `datt_crypto::keypair_from_seed()`.
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, crate::TypesError> {
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| crate::TypesError::InvalidLength {
                expected: 64,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0[..4]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_serializes_as_hex() {
        let sig = Signature([0xAB; 64]);
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json.len(), 128 + 2);
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn short_signature_rejected() {
        let json = format!("\"{}\"", "ab".repeat(63));
        assert!(serde_json::from_str::<Signature>(&json).is_err());
        assert!(Signature::from_slice(&[0u8; 10]).is_err());
    }
}
