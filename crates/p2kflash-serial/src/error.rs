//! Error types for the cartridge command protocol

use p2kflash_core::ChipIdentity;
use thiserror::Error;

/// Protocol-level errors
///
/// Framing faults (`SendTimeout`, `ResponseTimeout`, `EchoMismatch`) end the
/// current exchange. Nothing in this crate retries; callers decide.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The transport did not accept all bytes in time
    #[error("timed out sending {command}")]
    SendTimeout {
        /// Command (or payload description) being sent
        command: String,
    },

    /// The response stopped growing before it was complete
    #[error("no response to {command}: got {received} of {expected} byte(s)")]
    ResponseTimeout {
        /// Command awaiting a response
        command: String,
        /// Bytes expected in total
        expected: usize,
        /// Bytes available when the wait gave up
        received: usize,
    },

    /// The echoed command differs from the one sent
    #[error("invalid echo for {sent}: received {received:?}")]
    EchoMismatch {
        /// Command that was sent
        sent: String,
        /// Echo that came back (lossy ASCII)
        received: String,
    },

    /// Chip id is not part of the supported family
    #[error("unsupported flash chip: {0}")]
    UnsupportedChip(ChipIdentity),

    /// Checksum returned after a block write does not match
    #[error("checksum mismatch for block {block}: computed 0x{expected:02X}, device returned 0x{received:02X}")]
    ChecksumMismatch {
        /// Absolute block number
        block: u16,
        /// Locally computed checksum
        expected: u8,
        /// Checksum reported by the board
        received: u8,
    },

    /// Argument does not fit the 4-hex-digit wire encoding
    #[error("address 0x{argument:X} does not fit a {opcode} command")]
    InvalidAddress {
        /// Command opcode
        opcode: &'static str,
        /// Rejected argument
        argument: u32,
    },

    /// Command text is not exactly 8 printable ASCII bytes
    #[error("invalid command {0:?}: must be 8 printable ASCII characters")]
    InvalidCommand(String),

    /// Board identity string not recognised
    #[error("unsupported board: {0:?}")]
    UnsupportedBoard(String),

    /// Operation on a transport that is not open
    #[error("port is not open")]
    PortClosed,

    /// Failed to connect to the board
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serial port error
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    SerialError(#[from] serialport::Error),
}

/// Result type for protocol operations
pub type Result<T> = core::result::Result<T, ProtocolError>;

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::IoError(e.to_string())
    }
}
