//! Peer-to-peer messages for datt.
//!
//! Every message travels as a [`Msg`]: a command tag plus an opaque payload,
//! framed as
//!
//! ```text
//! [12 bytes command, NUL padded][u32be payload len][4 bytes checksum][payload]
//! ```
//!
//! Typed messages ([`MsgPing`], [`MsgPong`], [`MsgContentAuth`]) convert to and
//! from `Msg` through [`TypedMessage`]. Receivers dispatch on the tag with
//! [`Message::from_msg`], which keeps unrecognised tags as
//! [`Message::Unknown`] instead of failing.

pub mod command;
pub mod content_auth;
pub mod error;
pub mod message;
pub mod msg;
pub mod ping;

pub use command::Command;
pub use content_auth::MsgContentAuth;
pub use error::MessageError;
pub use message::Message;
pub use msg::{Msg, MsgHeader, CMD_LEN, HEADER_LEN, MAX_PAYLOAD};
pub use ping::{MsgPing, MsgPong};

/// A message type with a fixed command tag.
///
/// `from_msg(&x.to_msg()?)` must reproduce `x` exactly.
pub trait TypedMessage: Sized {
    const COMMAND: Command;

    fn to_msg(&self) -> Result<Msg, MessageError>;

    fn from_msg(msg: &Msg) -> Result<Self, MessageError>;
}

/// Reject a `Msg` whose tag is not `T::COMMAND`.
pub(crate) fn expect_command<T: TypedMessage>(msg: &Msg) -> Result<(), MessageError> {
    if msg.cmd() == T::COMMAND.as_str() {
        Ok(())
    } else {
        Err(MessageError::WrongCommand {
            expected: T::COMMAND.as_str(),
            actual: msg.cmd().to_string(),
        })
    }
}
