//! Stream framing: reading and writing whole `Msg` frames on byte streams.

pub mod codec;
pub mod error;

pub use codec::{read_frame, write_frame};
pub use error::ProtocolError;
