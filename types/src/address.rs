//! Signer address type with `datt_` prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// A signer address, always prefixed with `datt_`.
///
/// Derived from a public key by `datt_crypto::derive_address`; the encoded
/// form embeds the full public key plus a checksum.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The prefix every address carries.
    pub const PREFIX: &'static str = "datt_";

    /// Wrap a raw address string after a cheap prefix check.
    ///
    /// This does not validate the checksum; use `datt_crypto::decode_address` for that.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        if !s.starts_with(Self::PREFIX) || s.len() == Self::PREFIX.len() {
            return Err(TypesError::InvalidAddress(s));
        }
        if !s.is_ascii() {
            return Err(TypesError::InvalidAddress(s));
        }
        Ok(Self(s))
    }

    /// Wrap a string the caller has already produced in address form.
    pub fn new_unchecked(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}
