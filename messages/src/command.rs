//! Known command tags.

use std::fmt;

use crate::{Message, MessageError, Msg, MsgContentAuth, MsgPing, MsgPong, TypedMessage};

/// Every command this node understands.
///
/// Adding a variant forces a decoder in [`Command::decoder`]; tags not listed
/// here still travel as [`Message::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    Ping,
    Pong,
    ContentAuth,
}

pub type Decoder = fn(&Msg) -> Result<Message, MessageError>;

impl Command {
    pub const ALL: [Command; 3] = [Command::Ping, Command::Pong, Command::ContentAuth];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::ContentAuth => "contentauth",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == tag)
    }

    /// The payload decoder registered for this tag.
    pub fn decoder(self) -> Decoder {
        match self {
            Self::Ping => decode_ping,
            Self::Pong => decode_pong,
            Self::ContentAuth => decode_content_auth,
        }
    }
}

fn decode_ping(msg: &Msg) -> Result<Message, MessageError> {
    MsgPing::from_msg(msg).map(Message::Ping)
}

fn decode_pong(msg: &Msg) -> Result<Message, MessageError> {
    MsgPong::from_msg(msg).map(Message::Pong)
}

fn decode_content_auth(msg: &Msg) -> Result<Message, MessageError> {
    MsgContentAuth::from_msg(msg).map(Message::ContentAuth)
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
