pub mod constants;
pub mod error;
pub mod header;
pub mod packet;

pub use constants::{DEFAULT_HOST, DEFAULT_MAX_PAYLOAD, DEFAULT_PORT};
pub use error::{describe_error_code, ProtocolError, TransportError};
pub use header::{Command, Header};
pub use packet::PacketStream;
