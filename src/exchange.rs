//! Request/response exchanges, one per remote verb.
//!
//! Each exchange sends a header (plus the file body for PUT), waits for a
//! single reply and reports the result. Negative replies, unexpected verbs
//! and local file problems end the exchange with a [`Status`]; only
//! transport-level faults come back as `Err` and end the session.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::protocol::{describe_error_code, Command, Header, PacketStream, ProtocolError};
use crate::report::Reporter;

/// Terminal state of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Done,
    /// The server answered with a verb this exchange does not expect
    ProtocolMismatch(Header),
    /// The server answered NAK with this OS error code
    RemoteFailure { code: u32 },
    /// Aborted on the client side (bad filename, unreadable or unwritable file)
    LocalFailure,
}

pub async fn ls<S, R>(packets: &mut PacketStream<S>, reporter: &mut R) -> Result<Status, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Reporter + ?Sized,
{
    packets.send_header(&Header::new(Command::Ls)).await?;
    let reply = packets.recv_header().await?;

    if reply.command != Command::Lsout {
        return Ok(mismatch(reporter, Command::Ls, Command::Lsout, reply));
    }

    let listing = packets.recv_payload(reply.byte_count).await?;
    reporter.output(&listing);
    Ok(Status::Done)
}

pub async fn rm<S, R>(
    packets: &mut PacketStream<S>,
    reporter: &mut R,
    filename: &str,
) -> Result<Status, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Reporter + ?Sized,
{
    let request = Header::with_filename(Command::Rm, filename);
    if !send_request(packets, reporter, &request).await? {
        return Ok(Status::LocalFailure);
    }
    let reply = packets.recv_header().await?;

    Ok(match reply.command {
        Command::Ack => {
            info!("removed {}", filename);
            reporter.notice(&format!("{}: successfully removed", filename));
            Status::Done
        }
        Command::Nak => refused(reporter, filename, reply.byte_count),
        _ => mismatch(reporter, Command::Rm, Command::Ack, reply),
    })
}

/// Upload `dir/filename` under the same name. The size is checked against
/// the payload limit before the file is read, and the whole file is read
/// before the server is contacted.
pub async fn put<S, R>(
    packets: &mut PacketStream<S>,
    reporter: &mut R,
    dir: &Path,
    filename: &str,
) -> Result<Status, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Reporter + ?Sized,
{
    let path = dir.join(filename);
    let announced = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            reporter.problem(&format!("{}: {}", filename, describe_io(&e)));
            return Ok(Status::LocalFailure);
        }
    };
    if payload_size(announced, packets.max_payload()).is_none() {
        return Ok(too_large(reporter, filename, announced, packets.max_payload()));
    }

    let contents = match tokio::fs::read(&path).await {
        Ok(contents) => contents,
        Err(e) => {
            reporter.problem(&format!("{}: {}", filename, describe_io(&e)));
            return Ok(Status::LocalFailure);
        }
    };
    // The file may have grown since it was measured
    let Some(byte_count) = payload_size(contents.len() as u64, packets.max_payload()) else {
        return Ok(too_large(reporter, filename, contents.len() as u64, packets.max_payload()));
    };

    let mut request = Header::with_filename(Command::Put, filename);
    request.byte_count = byte_count;
    if !send_request(packets, reporter, &request).await? {
        return Ok(Status::LocalFailure);
    }
    packets.send_payload(&contents).await?;

    let reply = packets.recv_header().await?;
    Ok(match reply.command {
        Command::Ack => {
            info!("stored {} ({} bytes)", filename, byte_count);
            reporter.notice(&format!("{}: successfully copied to server", filename));
            Status::Done
        }
        Command::Nak => refused(reporter, filename, reply.byte_count),
        _ => mismatch(reporter, Command::Put, Command::Ack, reply),
    })
}

/// Download `filename` into `dir/filename`. The payload is always read off
/// the connection, even when the local file cannot be written.
pub async fn get<S, R>(
    packets: &mut PacketStream<S>,
    reporter: &mut R,
    dir: &Path,
    filename: &str,
) -> Result<Status, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Reporter + ?Sized,
{
    let request = Header::with_filename(Command::Get, filename);
    if !send_request(packets, reporter, &request).await? {
        return Ok(Status::LocalFailure);
    }
    let reply = packets.recv_header().await?;

    match reply.command {
        Command::File => {}
        Command::Nak => return Ok(refused(reporter, filename, reply.byte_count)),
        _ => {
            // Keep the stream in step before giving up on this exchange
            packets.recv_payload(reply.byte_count).await?;
            return Ok(mismatch(reporter, Command::Get, Command::File, reply));
        }
    }

    let contents = packets.recv_payload(reply.byte_count).await?;

    let path = dir.join(filename);
    if let Err(e) = write_local(&path, &contents).await {
        reporter.problem(&format!(
            "{}: unable to write local file: {}",
            filename,
            describe_io(&e)
        ));
        return Ok(Status::LocalFailure);
    }

    info!("fetched {} ({} bytes)", filename, contents.len());
    reporter.notice(&format!(
        "{}: successfully copied from server ({} bytes)",
        filename,
        contents.len()
    ));
    Ok(Status::Done)
}

/// Send a request header. A filename that cannot be encoded is reported
/// and gives `Ok(false)`; nothing reaches the server in that case.
async fn send_request<S, R>(
    packets: &mut PacketStream<S>,
    reporter: &mut R,
    request: &Header,
) -> Result<bool, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Reporter + ?Sized,
{
    match packets.send_header(request).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_local() => {
            debug!("not sending {}: {}", request.command, e);
            reporter.problem(&format!("{}: {}", request.filename, e));
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn refused<R: Reporter + ?Sized>(reporter: &mut R, filename: &str, code: u32) -> Status {
    reporter.problem(&format!("{}: {}", filename, describe_error_code(code)));
    Status::RemoteFailure { code }
}

fn mismatch<R: Reporter + ?Sized>(
    reporter: &mut R,
    sent: Command,
    expected: Command,
    reply: Header,
) -> Status {
    warn!("sent {}, server did not return {}", sent, expected);
    warn!("server returned {}", reply);
    reporter.problem(&format!(
        "sent {}, server returned {} instead of {}",
        sent, reply.command, expected
    ));
    Status::ProtocolMismatch(reply)
}

/// Byte count for a PUT of `len` bytes, if it fits both the limit and the
/// header field
fn payload_size(len: u64, limit: usize) -> Option<u32> {
    u32::try_from(len).ok().filter(|&n| n as usize <= limit)
}

fn too_large<R: Reporter + ?Sized>(reporter: &mut R, filename: &str, len: u64, limit: usize) -> Status {
    reporter.problem(&format!(
        "{}: {} bytes is larger than the {} byte limit",
        filename,
        len,
        limit.min(u32::MAX as usize)
    ));
    Status::LocalFailure
}

/// Write `contents` beside `path` under a temporary name, then rename it
/// into place. On failure the partial file is removed and whatever was at
/// `path` before is untouched.
async fn write_local(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result: std::io::Result<()> = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(contents).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&partial, path).await
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("leaving partial file {}: {}", partial.display(), e);
            }
        }
    }
    result
}

fn describe_io(e: &std::io::Error) -> String {
    match e.raw_os_error() {
        Some(code) => describe_error_code(code as u32),
        None => e.to_string(),
    }
}
