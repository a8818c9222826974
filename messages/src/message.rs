//! Tag dispatch over every known message.

use crate::{Command, MessageError, Msg, MsgContentAuth, MsgPing, MsgPong, TypedMessage};

/// Any message a peer may send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Ping(MsgPing),
    Pong(MsgPong),
    ContentAuth(MsgContentAuth),
    /// A tag this node does not understand, kept verbatim.
    Unknown { cmd: String, payload: Vec<u8> },
}

impl Message {
    /// Decode by tag. Unknown tags become [`Message::Unknown`]; a known tag
    /// with a bad payload is an error.
    pub fn from_msg(msg: &Msg) -> Result<Self, MessageError> {
        match msg.command() {
            Some(cmd) => (cmd.decoder())(msg),
            None => Ok(Self::Unknown {
                cmd: msg.cmd().to_string(),
                payload: msg.payload().to_vec(),
            }),
        }
    }

    /// Like [`from_msg`](Self::from_msg), but unknown tags are an error.
    pub fn decode_strict(msg: &Msg) -> Result<Self, MessageError> {
        match msg.command() {
            Some(cmd) => (cmd.decoder())(msg),
            None => Err(MessageError::UnknownCommand(msg.cmd().to_string())),
        }
    }

    pub fn to_msg(&self) -> Result<Msg, MessageError> {
        match self {
            Self::Ping(m) => m.to_msg(),
            Self::Pong(m) => m.to_msg(),
            Self::ContentAuth(m) => m.to_msg(),
            Self::Unknown { cmd, payload } => Msg::new(cmd.clone(), payload.clone()),
        }
    }

    pub fn command(&self) -> Option<Command> {
        match self {
            Self::Ping(_) => Some(Command::Ping),
            Self::Pong(_) => Some(Command::Pong),
            Self::ContentAuth(_) => Some(Command::ContentAuth),
            Self::Unknown { .. } => None,
        }
    }

    /// The wire tag, known or not.
    pub fn cmd(&self) -> &str {
        match self {
            Self::Unknown { cmd, .. } => cmd,
            known => known.command().map(Command::as_str).unwrap_or_default(),
        }
    }
}

impl From<MsgContentAuth> for Message {
    fn from(m: MsgContentAuth) -> Self {
        Self::ContentAuth(m)
    }
}
