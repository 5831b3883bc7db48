use std::fmt;

use tracing::error;

use crate::protocol::constants::*;
use crate::protocol::error::ProtocolError;

/// Command byte carried in every header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Error,
    Exit,
    Get,
    Help,
    Ls,
    Put,
    Rm,
    File,
    Lsout,
    Ack,
    Nak,
    /// A code this client does not know; kept so it can be logged
    Unknown(u8),
}

impl Command {
    pub fn code(self) -> u8 {
        match self {
            Command::Error => CMD_ERROR,
            Command::Exit => CMD_EXIT,
            Command::Get => CMD_GET,
            Command::Help => CMD_HELP,
            Command::Ls => CMD_LS,
            Command::Put => CMD_PUT,
            Command::Rm => CMD_RM,
            Command::File => CMD_FILE,
            Command::Lsout => CMD_LSOUT,
            Command::Ack => CMD_ACK,
            Command::Nak => CMD_NAK,
            Command::Unknown(code) => code,
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            CMD_ERROR => Command::Error,
            CMD_EXIT => Command::Exit,
            CMD_GET => Command::Get,
            CMD_HELP => Command::Help,
            CMD_LS => Command::Ls,
            CMD_PUT => Command::Put,
            CMD_RM => Command::Rm,
            CMD_FILE => Command::File,
            CMD_LSOUT => Command::Lsout,
            CMD_ACK => Command::Ack,
            CMD_NAK => Command::Nak,
            other => Command::Unknown(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Error => f.write_str("ERROR"),
            Command::Exit => f.write_str("EXIT"),
            Command::Get => f.write_str("GET"),
            Command::Help => f.write_str("HELP"),
            Command::Ls => f.write_str("LS"),
            Command::Put => f.write_str("PUT"),
            Command::Rm => f.write_str("RM"),
            Command::File => f.write_str("FILE"),
            Command::Lsout => f.write_str("LSOUT"),
            Command::Ack => f.write_str("ACK"),
            Command::Nak => f.write_str("NAK"),
            Command::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// Fixed-size message header (64 bytes)
///
/// ```text
/// +---------+----------------+------------------------------+
/// | command | byte_count     | filename                     |
/// | u8      | u32 LE         | 59 bytes, NUL-terminated     |
/// +---------+----------------+------------------------------+
/// ```
///
/// `byte_count` is the length of the payload that follows, except in a
/// NAK where it carries the server's OS error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub command: Command,
    pub byte_count: u32,
    pub filename: String,
}

impl Header {
    pub const SIZE: usize = HEADER_SIZE;

    pub fn new(command: Command) -> Self {
        Self {
            command,
            byte_count: 0,
            filename: String::new(),
        }
    }

    pub fn with_filename(command: Command, filename: &str) -> Self {
        Self {
            command,
            byte_count: 0,
            filename: filename.to_string(),
        }
    }

    /// Encode into the wire layout. Filenames that do not fit (including
    /// the terminator) are rejected, never truncated.
    pub fn encode(&self) -> Result<[u8; Self::SIZE], ProtocolError> {
        let name = self.filename.as_bytes();
        if name.len() >= FILENAME_SIZE {
            return Err(ProtocolError::filename_too_long(name.len()));
        }
        if name.contains(&0) {
            return Err(ProtocolError::InvalidFilename);
        }

        let mut buf = [0u8; Self::SIZE];
        buf[COMMAND_OFFSET] = self.command.code();
        buf[BYTE_COUNT_OFFSET..FILENAME_OFFSET].copy_from_slice(&self.byte_count.to_le_bytes());
        buf[FILENAME_OFFSET..FILENAME_OFFSET + name.len()].copy_from_slice(name);
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < Self::SIZE {
            error!("Header too short: {} bytes", buf.len());
            return Err(ProtocolError::MalformedHeader(buf.len()));
        }

        let byte_count = u32::from_le_bytes([
            buf[BYTE_COUNT_OFFSET],
            buf[BYTE_COUNT_OFFSET + 1],
            buf[BYTE_COUNT_OFFSET + 2],
            buf[BYTE_COUNT_OFFSET + 3],
        ]);

        let field = &buf[FILENAME_OFFSET..Self::SIZE];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());

        Ok(Self {
            command: Command::from(buf[COMMAND_OFFSET]),
            byte_count,
            filename: String::from_utf8_lossy(&field[..end]).into_owned(),
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}, {}, {:?}}}",
            self.command, self.byte_count, self.filename
        )
    }
}
