//! Bank/block addressing inside a cartridge image

use core::fmt;

use crate::cartridge::{BANK_COUNT, BANK_SIZE};
use crate::directory::layout::{
    DATA_BASE, DIRECTORY_SLOTS, FRAGMENT_OFFSET, HEADER_BASE, HEADER_STRIDE, PAYLOAD_SIZE,
};

/// A (bank, block) pair inside a cartridge image
///
/// The 16-bit "vector" form keeps the bank in the high byte and the block
/// in the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockAddress {
    /// Bank index (0-7)
    pub bank: u8,
    /// Block index within the bank (0-59 for directory blocks)
    pub block: u8,
}

impl BlockAddress {
    /// Create a block address
    pub const fn new(bank: u8, block: u8) -> Self {
        Self { bank, block }
    }

    /// Split a vector into bank and block
    pub const fn from_vector(vector: u16) -> Self {
        Self {
            bank: (vector >> 8) as u8,
            block: vector as u8,
        }
    }

    /// Encode as a vector
    pub const fn vector(self) -> u16 {
        (self.bank as u16) << 8 | self.block as u16
    }

    /// Whether the address lies inside the 8 bank x 60 block grid
    pub fn in_grid(self) -> bool {
        (self.bank as usize) < BANK_COUNT && (self.block as usize) < DIRECTORY_SLOTS
    }

    /// Start of the bank in a flat image
    pub fn bank_offset(self) -> usize {
        self.bank as usize * BANK_SIZE
    }

    /// Start of this block's 0x40-byte header
    pub fn header_offset(self) -> usize {
        self.bank_offset() + HEADER_BASE + self.block as usize * HEADER_STRIDE
    }

    /// Start of the 32-byte media header fragment kept inside the header
    pub fn fragment_offset(self) -> usize {
        self.header_offset() + FRAGMENT_OFFSET
    }

    /// Start of this block's 1 KiB data payload
    pub fn payload_offset(self) -> usize {
        self.bank_offset() + DATA_BASE + self.block as usize * PAYLOAD_SIZE
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:02}", self.bank, self.block)
    }
}

impl From<u16> for BlockAddress {
    fn from(vector: u16) -> Self {
        Self::from_vector(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_split() {
        let addr = BlockAddress::from_vector(0x0312);
        assert_eq!(addr, BlockAddress::new(3, 0x12));
        assert_eq!(addr.vector(), 0x0312);
    }

    #[test]
    fn test_offsets() {
        let addr = BlockAddress::new(1, 2);
        assert_eq!(addr.header_offset(), 0x10000 + 0x100 + 2 * 0x40);
        assert_eq!(addr.fragment_offset(), 0x10000 + 0x100 + 2 * 0x40 + 0x20);
        assert_eq!(addr.payload_offset(), 0x10000 + 0x1000 + 2 * 0x400);
    }

    #[test]
    fn test_last_block_fills_bank() {
        let last = BlockAddress::new(0, 59);
        assert_eq!(last.header_offset() + 0x40, DATA_BASE);
        assert_eq!(last.payload_offset() + PAYLOAD_SIZE, BANK_SIZE);
    }

    #[test]
    fn test_grid() {
        assert!(BlockAddress::new(7, 59).in_grid());
        assert!(!BlockAddress::new(8, 0).in_grid());
        assert!(!BlockAddress::new(0, 60).in_grid());
        assert!(!BlockAddress::from_vector(0xFFFF).in_grid());
    }

    #[test]
    fn test_display() {
        assert_eq!(BlockAddress::new(2, 7).to_string(), "02.07");
    }
}
