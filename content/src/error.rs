use datt_types::Address;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentAuthError {
    #[error("content auth is incomplete: missing {missing}")]
    Incomplete { missing: &'static str },

    #[error("signing key belongs to {actual}, but content auth declares {expected}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("address does not decode to a public key: {0}")]
    MalformedAddress(String),

    #[error("{field} is {len} bytes, longer than a u32 length prefix allows")]
    FieldTooLong { field: &'static str, len: usize },
}
