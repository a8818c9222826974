//! `contentauth` messages carry one signed content auth as JSON.

use datt_content::ContentAuth;

use crate::{expect_command, Command, MessageError, Msg, TypedMessage};

/// A content auth in transit.
///
/// Decoding does not check the signature. Call
/// [`ContentAuth::verify`] on the result before trusting it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgContentAuth {
    pub content_auth: ContentAuth,
}

impl MsgContentAuth {
    pub fn from_content_auth(content_auth: ContentAuth) -> Self {
        Self { content_auth }
    }

    pub fn into_content_auth(self) -> ContentAuth {
        self.content_auth
    }
}

impl From<ContentAuth> for MsgContentAuth {
    fn from(content_auth: ContentAuth) -> Self {
        Self::from_content_auth(content_auth)
    }
}

impl TypedMessage for MsgContentAuth {
    const COMMAND: Command = Command::ContentAuth;

    fn to_msg(&self) -> Result<Msg, MessageError> {
        let payload = serde_json::to_vec(&self.content_auth).map_err(|e| MessageError::Encode {
            cmd: Self::COMMAND.as_str(),
            reason: e.to_string(),
        })?;
        Msg::from_command(Self::COMMAND, payload)
    }

    fn from_msg(msg: &Msg) -> Result<Self, MessageError> {
        expect_command::<Self>(msg)?;
        let content_auth =
            serde_json::from_slice(msg.payload()).map_err(|e| MessageError::Malformed {
                cmd: Self::COMMAND.as_str(),
                reason: e.to_string(),
            })?;
        Ok(Self { content_auth })
    }
}
