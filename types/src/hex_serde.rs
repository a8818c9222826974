//! Serde adapters that encode fixed-size byte arrays as lowercase hex strings.
//!
//! Used for every binary field that appears in JSON payloads so that the
//! serialized form is stable across implementations.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Serialize `bytes` as a hex string.
pub fn serialize<S: Serializer, const N: usize>(
    bytes: &[u8; N],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// Deserialize a hex string into exactly `N` bytes.
pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
    deserializer: D,
) -> Result<[u8; N], D::Error> {
    let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
    decode_fixed(&s).map_err(D::Error::custom)
}

/// Decode a hex string into exactly `N` bytes.
pub fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], crate::TypesError> {
    let raw = hex::decode(s).map_err(|e| crate::TypesError::InvalidHex(e.to_string()))?;
    raw.as_slice()
        .try_into()
        .map_err(|_| crate::TypesError::InvalidLength {
            expected: N,
            actual: raw.len(),
        })
}
