//! The `Msg` envelope and its binary frame.

use std::fmt;

use crate::{Command, MessageError};

/// Width of the NUL-padded command field.
pub const CMD_LEN: usize = 12;
/// Command, payload length and checksum.
pub const HEADER_LEN: usize = CMD_LEN + 4 + 4;
/// Largest payload a frame may carry (16 MiB).
pub const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A command tag and its payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Msg {
    cmd: String,
    payload: Vec<u8>,
}

impl Msg {
    /// Build a message for an arbitrary tag.
    ///
    /// The tag must be 1 to 12 printable ASCII bytes and the payload must fit a frame.
    pub fn new(cmd: impl Into<String>, payload: Vec<u8>) -> Result<Self, MessageError> {
        let cmd = cmd.into();
        validate_command(cmd.as_bytes())?;
        if payload.len() > MAX_PAYLOAD {
            return Err(MessageError::PayloadTooLarge(payload.len()));
        }
        Ok(Self { cmd, payload })
    }

    /// Build a message for a known command.
    pub fn from_command(cmd: Command, payload: Vec<u8>) -> Result<Self, MessageError> {
        Self::new(cmd.as_str(), payload)
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    /// The known command for this tag, if any.
    pub fn command(&self) -> Option<Command> {
        Command::parse(&self.cmd)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.cmd, self.payload)
    }

    /// Length of the encoded frame.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Encode as one frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.frame_len());
        let mut cmd = [0u8; CMD_LEN];
        cmd[..self.cmd.len()].copy_from_slice(self.cmd.as_bytes());
        out.extend_from_slice(&cmd);
        // Bounded by MAX_PAYLOAD at construction.
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&checksum(&self.payload));
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode exactly one frame; trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let header_bytes: &[u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(MessageError::Truncated {
                needed: HEADER_LEN,
                available: bytes.len(),
            })?;
        let header = MsgHeader::decode(header_bytes)?;
        let body = &bytes[HEADER_LEN..];
        let len = header.payload_len();
        if body.len() < len {
            return Err(MessageError::Truncated {
                needed: HEADER_LEN + len,
                available: bytes.len(),
            });
        }
        if body.len() > len {
            return Err(MessageError::TrailingBytes(body.len() - len));
        }
        header.into_msg(body.to_vec())
    }
}

impl fmt::Debug for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Msg")
            .field("cmd", &self.cmd)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// A decoded frame header, before the payload has been read.
///
/// Stream readers decode the header first to learn how many payload bytes follow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgHeader {
    cmd: String,
    payload_len: u32,
    checksum: [u8; 4],
}

impl MsgHeader {
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self, MessageError> {
        let raw_cmd = &bytes[..CMD_LEN];
        let end = raw_cmd.iter().position(|&b| b == 0).unwrap_or(CMD_LEN);
        if raw_cmd[end..].iter().any(|&b| b != 0) {
            return Err(MessageError::InvalidCommand(
                String::from_utf8_lossy(raw_cmd).into_owned(),
            ));
        }
        validate_command(&raw_cmd[..end])?;
        let cmd = String::from_utf8_lossy(&raw_cmd[..end]).into_owned();

        let payload_len = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        if payload_len as usize > MAX_PAYLOAD {
            return Err(MessageError::PayloadTooLarge(payload_len as usize));
        }
        let checksum = [bytes[16], bytes[17], bytes[18], bytes[19]];
        Ok(Self {
            cmd,
            payload_len,
            checksum,
        })
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len as usize
    }

    /// Attach the payload, checking its length and checksum.
    pub fn into_msg(self, payload: Vec<u8>) -> Result<Msg, MessageError> {
        if payload.len() != self.payload_len() {
            return Err(MessageError::Truncated {
                needed: self.payload_len(),
                available: payload.len(),
            });
        }
        if checksum(&payload) != self.checksum {
            return Err(MessageError::BadChecksum);
        }
        Ok(Msg {
            cmd: self.cmd,
            payload,
        })
    }
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = datt_crypto::blake2b_256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

fn validate_command(cmd: &[u8]) -> Result<(), MessageError> {
    let printable = cmd.iter().all(|&b| (0x21..=0x7e).contains(&b));
    if cmd.is_empty() || cmd.len() > CMD_LEN || !printable {
        return Err(MessageError::InvalidCommand(
            String::from_utf8_lossy(cmd).into_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let msg = Msg::new("contentauth", vec![1, 2, 3]).unwrap();
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + 3);
        assert_eq!(&bytes[..11], b"contentauth");
        assert_eq!(bytes[11], 0);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 3]);
        assert_eq!(&bytes[20..], &[1, 2, 3]);
    }

    #[test]
    fn empty_payload_frame() {
        let msg = Msg::from_command(Command::Ping, Vec::new()).unwrap();
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(Msg::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn rejects_bad_tags() {
        assert!(matches!(Msg::new("", vec![]), Err(MessageError::InvalidCommand(_))));
        assert!(matches!(
            Msg::new("thirteenchars", vec![]),
            Err(MessageError::InvalidCommand(_))
        ));
        assert!(matches!(Msg::new("has space", vec![]), Err(MessageError::InvalidCommand(_))));
    }

    #[test]
    fn rejects_gap_in_padding() {
        let mut bytes = Msg::new("ping", vec![]).unwrap().to_bytes();
        bytes[6] = b'x';
        assert!(matches!(
            Msg::from_bytes(&bytes),
            Err(MessageError::InvalidCommand(_))
        ));
    }

    #[test]
    fn detects_corrupted_payload() {
        let mut bytes = Msg::new("blob", vec![9; 32]).unwrap().to_bytes();
        bytes[HEADER_LEN + 5] ^= 0xFF;
        assert_eq!(Msg::from_bytes(&bytes), Err(MessageError::BadChecksum));
    }

    #[test]
    fn truncated_and_trailing() {
        let bytes = Msg::new("blob", vec![7; 10]).unwrap().to_bytes();
        assert!(matches!(
            Msg::from_bytes(&bytes[..HEADER_LEN - 1]),
            Err(MessageError::Truncated { .. })
        ));
        assert!(matches!(
            Msg::from_bytes(&bytes[..bytes.len() - 1]),
            Err(MessageError::Truncated { .. })
        ));
        let mut long = bytes.clone();
        long.push(0);
        assert_eq!(Msg::from_bytes(&long), Err(MessageError::TrailingBytes(1)));
    }

    #[test]
    fn oversized_length_rejected_before_reading_payload() {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(b"blob");
        header[12..16].copy_from_slice(&((MAX_PAYLOAD as u32) + 1).to_be_bytes());
        assert!(matches!(
            MsgHeader::decode(&header),
            Err(MessageError::PayloadTooLarge(_))
        ));
    }
}
