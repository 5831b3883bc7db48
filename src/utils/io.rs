use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::protocol::error::TransportError;

/// Write every byte of `buf`, retrying short writes until done
pub async fn send_exact<W: AsyncWrite + Unpin>(
    writer: &mut W,
    buf: &[u8],
) -> Result<(), TransportError> {
    let mut sent = 0;
    while sent < buf.len() {
        match writer.write(&buf[sent..]).await {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => {
                sent += n;
                trace!("sent {} of {} bytes", sent, buf.len());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    writer.flush().await?;
    Ok(())
}

/// Read exactly `len` bytes, retrying short reads until done
pub async fn recv_exact<R: AsyncRead + Unpin>(
    reader: &mut R,
    len: usize,
) -> Result<Vec<u8>, TransportError> {
    let mut buf = vec![0u8; len];
    let mut received = 0;
    while received < len {
        match reader.read(&mut buf[received..]).await {
            Ok(0) => {
                return Err(TransportError::PrematureEof {
                    expected: len,
                    received,
                })
            }
            Ok(n) => {
                received += n;
                trace!("received {} of {} bytes", received, len);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}
