//! Job-level errors

use std::fmt;

use p2kflash_core::ChipIdentity;
use p2kflash_serial::ProtocolError;
use thiserror::Error;

/// A block whose programming failed and was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    /// Absolute block number
    pub block: u16,
    /// Why programming failed
    pub reason: String,
}

impl fmt::Display for SkippedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}: {}", self.block, self.reason)
    }
}

/// Errors from read/flash/verify jobs
///
/// Every protocol failure carries the block or sector it happened on.
#[derive(Debug, Error)]
pub enum JobError {
    /// Another job holds the port
    #[error("port is busy (gave up after {attempts} attempt(s))")]
    PortBusy {
        /// Lock attempts made
        attempts: u32,
    },

    /// Image does not fit into one slot
    #[error("image is {len} bytes, a slot holds at most {capacity}")]
    ImageTooLarge {
        /// Image length
        len: usize,
        /// Slot capacity
        capacity: usize,
    },

    /// Flash chip is not part of the supported family
    #[error("unsupported flash chip: {0}")]
    UnsupportedChip(ChipIdentity),

    /// A block operation failed
    #[error("block {block}: {source}")]
    Block {
        /// Absolute block number
        block: u16,
        /// Underlying protocol error
        source: ProtocolError,
    },

    /// A sector erase failed
    #[error("sector {sector}: {source}")]
    Sector {
        /// Absolute sector number
        sector: u16,
        /// Underlying protocol error
        source: ProtocolError,
    },

    /// Read-back differs from the expected image
    #[error(
        "verification failed: {mismatches} byte(s) differ, first at offset 0x{first_mismatch:04X} ({} block(s) skipped)",
        skipped.len()
    )]
    VerificationFailed {
        /// Offset of the first differing byte within the slot
        first_mismatch: usize,
        /// Number of differing bytes
        mismatches: usize,
        /// Blocks skipped while programming
        skipped: Vec<SkippedBlock>,
    },

    /// Protocol error outside a block or sector operation
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The job worker could not be started or died
    #[error("job worker failed: {0}")]
    Worker(String),
}

/// Result type for jobs
pub type Result<T> = std::result::Result<T, JobError>;
