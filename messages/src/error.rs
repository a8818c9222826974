use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("payload checksum mismatch")]
    BadChecksum,

    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),

    #[error("invalid command tag: {0:?}")]
    InvalidCommand(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("expected {expected} message, got {actual}")]
    WrongCommand { expected: &'static str, actual: String },

    #[error("malformed {cmd} payload: {reason}")]
    Malformed { cmd: &'static str, reason: String },

    #[error("failed to encode {cmd} payload: {reason}")]
    Encode { cmd: &'static str, reason: String },
}
