use datt_messages::MessageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The header cannot be trusted, so the stream position is lost.
    #[error("corrupt frame header: {0}")]
    BadHeader(#[from] MessageError),

    #[error("stream ended inside a frame")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
