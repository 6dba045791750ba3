//! Error types for the directory codec

use thiserror::Error;

use crate::address::BlockAddress;

/// Errors raised while decoding or encoding a directory image
///
/// Decode faults are reported per entry; a broken entry never stops the
/// rest of the directory from being read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A header or payload lies (partly) beyond the end of the image
    #[error("entry {vector:#06X}: block {at} lies beyond the end of the image")]
    TruncatedHeader {
        /// Directory vector of the entry being decoded
        vector: u16,
        /// Block whose header or payload is missing
        at: BlockAddress,
    },

    /// The block chain leaves the bank/block grid or never terminates
    #[error("entry {vector:#06X}: broken block chain at {at} after {steps} step(s)")]
    BrokenChain {
        /// Directory vector of the entry being decoded
        vector: u16,
        /// Offending chain element
        at: BlockAddress,
        /// Number of blocks visited before giving up
        steps: usize,
    },

    /// A header does not carry the pre-formatted bank/address pattern
    #[error(
        "bank {bank} slot {slot}: header byte +{offset:#04X} is 0x{found:02X}, expected 0x{expected:02X}"
    )]
    LayoutMismatch {
        /// Bank of the offending header
        bank: u8,
        /// Directory slot of the offending header
        slot: u8,
        /// Offset of the checked byte inside the header
        offset: usize,
        /// Value required by the layout
        expected: u8,
        /// Value found in the image
        found: u8,
    },

    /// The image is shorter than a full cartridge
    #[error("image is {len} bytes, expected {expected}")]
    ImageSize {
        /// Actual image length
        len: usize,
        /// Required image length
        expected: usize,
    },

    /// A media image is not a whole number of records
    #[error("media image of {len} bytes is not a multiple of {record} bytes")]
    MalformedMedia {
        /// Length of the rejected media image
        len: usize,
        /// Record length
        record: usize,
    },

    /// No free data blocks or directory slots remain
    #[error("cartridge image is full: {needed} block(s) requested, {free} free")]
    ImageFull {
        /// Blocks requested by the file being added
        needed: usize,
        /// Blocks still free
        free: usize,
    },
}

/// Result type for codec operations
pub type Result<T> = core::result::Result<T, CodecError>;
