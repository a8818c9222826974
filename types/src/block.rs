//! Anchor block hash.
//!
//! Chains display block hashes as hex with the byte order reversed relative to
//! how the hash is produced and stored. A [`BlockHash`] always holds the
//! internal (storage) order; the display form only exists at the edges via
//! [`BlockHash::from_display_hex`] and [`BlockHash::to_display_hex`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// A 32-byte block hash in internal byte order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash(#[serde(with = "crate::hex_serde")] [u8; 32]);

impl BlockHash {
    pub const LEN: usize = 32;
    pub const ZERO: Self = Self([0u8; 32]);

    /// Wrap bytes that are already in internal order.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Wrap a slice that is already in internal order.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypesError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse the hex form a block explorer shows, reversing it into internal order.
    pub fn from_display_hex(display: &str) -> Result<Self, TypesError> {
        let mut bytes: [u8; 32] = crate::hex_serde::decode_fixed(display)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// Parse hex that is already in internal order.
    pub fn from_internal_hex(internal: &str) -> Result<Self, TypesError> {
        Ok(Self(crate::hex_serde::decode_fixed(internal)?))
    }

    /// The hex form a block explorer shows (reversed byte order).
    pub fn to_display_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl Default for BlockHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display = self.to_display_hex();
        write!(f, "BlockHash({}\u{2026})", &display[..8])
    }
}

/// Displays in chain (reversed) order, matching block explorers.
impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY: &str = "00000000000000000e6188a4cc93e3d3244b20bfdef1e9bd9db932e30f3aa2f1";

    #[test]
    fn display_hex_is_reversed_into_internal_order() {
        let hash = BlockHash::from_display_hex(DISPLAY).unwrap();
        assert_eq!(hash.as_bytes()[0], 0xf1);
        assert_eq!(hash.as_bytes()[31], 0x00);
        assert_eq!(hash.to_display_hex(), DISPLAY);
        assert_eq!(hash.to_string(), DISPLAY);
    }

    #[test]
    fn internal_hex_is_not_reversed() {
        let hash = BlockHash::from_display_hex(DISPLAY).unwrap();
        let internal = hex::encode(hash.as_bytes());
        assert_eq!(BlockHash::from_internal_hex(&internal).unwrap(), hash);
        assert_ne!(internal, DISPLAY);
    }

    #[test]
    fn wrong_length_rejected() {
        assert_eq!(
            BlockHash::from_display_hex("abcd"),
            Err(TypesError::InvalidLength {
                expected: 32,
                actual: 2
            })
        );
        assert!(BlockHash::from_slice(&[0u8; 31]).is_err());
    }

    #[test]
    fn non_hex_rejected() {
        let bad = "zz".repeat(32);
        assert!(matches!(
            BlockHash::from_display_hex(&bad),
            Err(TypesError::InvalidHex(_))
        ));
    }

    #[test]
    fn serializes_as_internal_hex() {
        let hash = BlockHash::from_display_hex(DISPLAY).unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hex::encode(hash.as_bytes())));
        let back: BlockHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
