use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::constants::{FILENAME_SIZE, HEADER_SIZE};

/// Faults on the stream connection itself. All of these end the session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed by server")]
    Closed,

    #[error("connection reset by server")]
    Reset,

    #[error("connection closed after {received} of {expected} bytes")]
    PrematureEof { expected: usize, received: usize },

    #[error("no progress from server within {0:?}")]
    TimedOut(Duration),

    #[error("socket error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset => TransportError::Reset,
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::WriteZero => TransportError::Closed,
            _ => TransportError::Io(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed header: {0} bytes, expected {}", HEADER_SIZE)]
    MalformedHeader(usize),

    #[error("filename is {len} bytes, must be shorter than {max}")]
    FilenameTooLong { len: usize, max: usize },

    #[error("filename contains a NUL byte")]
    InvalidFilename,

    #[error("server announced a {announced} byte payload, limit is {limit}")]
    OversizedPayload { announced: u32, limit: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    pub fn filename_too_long(len: usize) -> Self {
        ProtocolError::FilenameTooLong {
            len,
            max: FILENAME_SIZE,
        }
    }

    /// Errors caught before anything was sent; the session can carry on.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ProtocolError::FilenameTooLong { .. } | ProtocolError::InvalidFilename
        )
    }
}

/// Render an OS error code carried in a NAK as a human-readable message.
pub fn describe_error_code(code: u32) -> String {
    let Ok(raw) = i32::try_from(code) else {
        return format!("unknown error {code}");
    };
    let text = io::Error::from_raw_os_error(raw).to_string();
    // io::Error appends " (os error N)"; the operator only needs the description
    match text.rfind(" (os error ") {
        Some(idx) if idx > 0 => text[..idx].to_string(),
        _ => text,
    }
}
