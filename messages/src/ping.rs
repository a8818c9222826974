//! Liveness messages. Both carry an empty payload.

use crate::{expect_command, Command, MessageError, Msg, TypedMessage};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsgPing;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsgPong;

fn empty_payload(msg: &Msg, cmd: &'static str) -> Result<(), MessageError> {
    if msg.payload().is_empty() {
        Ok(())
    } else {
        Err(MessageError::Malformed {
            cmd,
            reason: format!("expected empty payload, got {} bytes", msg.payload().len()),
        })
    }
}

impl TypedMessage for MsgPing {
    const COMMAND: Command = Command::Ping;

    fn to_msg(&self) -> Result<Msg, MessageError> {
        Msg::from_command(Self::COMMAND, Vec::new())
    }

    fn from_msg(msg: &Msg) -> Result<Self, MessageError> {
        expect_command::<Self>(msg)?;
        empty_payload(msg, Self::COMMAND.as_str())?;
        Ok(Self)
    }
}

impl TypedMessage for MsgPong {
    const COMMAND: Command = Command::Pong;

    fn to_msg(&self) -> Result<Msg, MessageError> {
        Msg::from_command(Self::COMMAND, Vec::new())
    }

    fn from_msg(msg: &Msg) -> Result<Self, MessageError> {
        expect_command::<Self>(msg)?;
        empty_payload(msg, Self::COMMAND.as_str())?;
        Ok(Self)
    }
}
