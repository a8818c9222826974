//! Frame codec for stream transports.
//!
//! A frame is self-delimiting (see [`datt_messages::Msg`]): read the fixed
//! header, learn the payload length, read the payload. Payload integrity
//! (the checksum) is left to `Msg::from_bytes` so a corrupt payload can be
//! dropped without tearing down the stream.

use datt_messages::{MsgHeader, HEADER_LEN};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtocolError;

/// Read one raw frame (header and payload).
///
/// Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let first = reader.read(&mut header).await?;
    if first == 0 {
        return Ok(None);
    }
    if first < HEADER_LEN {
        read_rest(reader, &mut header[first..]).await?;
    }

    let parsed = MsgHeader::decode(&header)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + parsed.payload_len());
    frame.extend_from_slice(&header);
    frame.resize(HEADER_LEN + parsed.payload_len(), 0);
    read_rest(reader, &mut frame[HEADER_LEN..]).await?;
    Ok(Some(frame))
}

/// Write one encoded frame and flush it.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_rest<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ProtocolError::UnexpectedEof),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datt_messages::{MessageError, Msg, MAX_PAYLOAD};

    #[tokio::test]
    async fn reads_back_to_back_frames() {
        let a = Msg::new("ping", vec![]).unwrap();
        let b = Msg::new("blob", vec![5; 300]).unwrap();
        let (mut client, mut server) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            write_frame(&mut client, &a.to_bytes()).await.unwrap();
            write_frame(&mut client, &b.to_bytes()).await.unwrap();
        });

        let first = read_frame(&mut server).await.unwrap().unwrap();
        let second = read_frame(&mut server).await.unwrap().unwrap();
        writer.await.unwrap();
        assert_eq!(Msg::from_bytes(&first).unwrap().cmd(), "ping");
        assert_eq!(Msg::from_bytes(&second).unwrap().payload().len(), 300);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_an_error() {
        let bytes = Msg::new("blob", vec![1; 50]).unwrap().to_bytes();
        let mut reader = &bytes[..30];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[tokio::test]
    async fn oversized_header_is_rejected_without_allocating() {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(b"blob");
        header[12..16].copy_from_slice(&u32::MAX.to_be_bytes());
        let mut reader = &header[..];
        match read_frame(&mut reader).await {
            Err(ProtocolError::BadHeader(MessageError::PayloadTooLarge(n))) => {
                assert!(n > MAX_PAYLOAD)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn corrupt_payload_is_passed_through_for_the_caller() {
        let mut bytes = Msg::new("blob", vec![1; 8]).unwrap().to_bytes();
        bytes[HEADER_LEN] ^= 0xFF;
        let mut reader = &bytes[..];
        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(Msg::from_bytes(&frame), Err(MessageError::BadChecksum));
    }
}
