//! Protocol constants shared with the cix server

/// Width of the NUL-terminated filename field
pub const FILENAME_SIZE: usize = 59;

/// Fixed header: command (1) + byte count (4) + filename
pub const HEADER_SIZE: usize = 1 + 4 + FILENAME_SIZE;

/// Field offsets within an encoded header
pub const COMMAND_OFFSET: usize = 0;
pub const BYTE_COUNT_OFFSET: usize = 1;
pub const FILENAME_OFFSET: usize = 5;

/// Command codes
pub const CMD_ERROR: u8 = 0;
pub const CMD_EXIT: u8 = 1;
pub const CMD_GET: u8 = 2;
pub const CMD_HELP: u8 = 3;
pub const CMD_LS: u8 = 4;
pub const CMD_PUT: u8 = 5;
pub const CMD_RM: u8 = 6;
pub const CMD_FILE: u8 = 7;
pub const CMD_LSOUT: u8 = 8;
pub const CMD_ACK: u8 = 9;
pub const CMD_NAK: u8 = 10;

/// Connection defaults
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 50000;

/// Largest payload accepted from (or sent to) the server unless configured
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024; // 64MB
