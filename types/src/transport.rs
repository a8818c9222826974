//! Transport kind names.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Name of a transport medium (`"socket"`, `"websocket"`, ...).
///
/// Kinds are open-ended strings so that new transports are additive; the
/// well-known ones have constants.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportKind(Cow<'static, str>);

impl TransportKind {
    /// Raw TCP sockets.
    pub const SOCKET: Self = Self(Cow::Borrowed("socket"));
    /// WebSocket binary messages.
    pub const WEBSOCKET: Self = Self(Cow::Borrowed("websocket"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TransportKind {
    fn from(s: &'static str) -> Self {
        Self(Cow::Borrowed(s))
    }
}
