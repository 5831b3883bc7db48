use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

use crate::protocol::error::{ProtocolError, TransportError};
use crate::protocol::header::Header;
use crate::utils::io::{recv_exact, send_exact};

/// A connected stream carrying headers and payloads.
///
/// Every transfer is exact-length. Payload sizes announced by the server are
/// checked against `max_payload` before any buffer is allocated. When
/// `io_timeout` is set each send or receive must finish within it.
#[derive(Debug)]
pub struct PacketStream<S> {
    stream: S,
    max_payload: usize,
    io_timeout: Option<Duration>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> PacketStream<S> {
    pub fn new(stream: S, max_payload: usize, io_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            max_payload,
            io_timeout,
        }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub async fn send_header(&mut self, header: &Header) -> Result<(), ProtocolError> {
        let buf = header.encode()?;
        debug!("sending header {}", header);
        self.send_exact(&buf).await?;
        Ok(())
    }

    pub async fn recv_header(&mut self) -> Result<Header, ProtocolError> {
        let buf = self.recv_exact(Header::SIZE).await?;
        let header = Header::decode(&buf)?;
        debug!("received header {}", header);
        Ok(header)
    }

    pub async fn send_payload(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        self.send_exact(payload).await?;
        debug!("sent {} bytes", payload.len());
        Ok(())
    }

    /// Receive the payload announced by a header's byte count
    pub async fn recv_payload(&mut self, byte_count: u32) -> Result<Vec<u8>, ProtocolError> {
        let len = usize::try_from(byte_count).unwrap_or(usize::MAX);
        if len > self.max_payload {
            error!(
                "Refusing {} byte payload (limit {})",
                byte_count, self.max_payload
            );
            return Err(ProtocolError::OversizedPayload {
                announced: byte_count,
                limit: self.max_payload,
            });
        }
        let payload = self.recv_exact(len).await?;
        debug!("received {} bytes", payload.len());
        Ok(payload)
    }

    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn send_exact(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let timeout = self.io_timeout;
        bounded(timeout, send_exact(&mut self.stream, buf)).await
    }

    async fn recv_exact(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let timeout = self.io_timeout;
        bounded(timeout, recv_exact(&mut self.stream, len)).await
    }
}

async fn bounded<T, F>(timeout: Option<Duration>, op: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match timeout {
        None => op.await,
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| TransportError::TimedOut(limit))?,
    }
}
