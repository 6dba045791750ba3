//! Cartridge flash geometry and slot addressing
//!
//! The reader board talks to an SST39SF0x0 parallel flash. Programming
//! happens in 256-byte blocks, erasing in 4 KiB sectors, and user-visible
//! transfers move one 16 KiB slot at a time.

use core::fmt;
use core::ops::Range;

/// Programmable unit in bytes
pub const BLOCK_SIZE: usize = 0x100;

/// Erase unit in bytes
pub const SECTOR_SIZE: usize = 0x1000;

/// Blocks covered by one sector erase
pub const BLOCKS_PER_SECTOR: usize = SECTOR_SIZE / BLOCK_SIZE;

/// Size of one transfer slot in bytes
pub const SLOT_SIZE: usize = 0x4000;

/// Blocks in one slot
pub const BLOCKS_PER_SLOT: usize = SLOT_SIZE / BLOCK_SIZE;

/// Sectors in one slot
pub const SECTORS_PER_SLOT: usize = SLOT_SIZE / SECTOR_SIZE;

/// Number of addressable slots
///
/// Block reads carry `block * 0x100` in a 4-hex-digit argument, which caps
/// the reachable window at 64 KiB.
pub const SLOT_COUNT: u8 = 4;

/// Number of 64 KiB banks in a full cartridge image
pub const BANK_COUNT: usize = 8;

/// Size of one bank in bytes
pub const BANK_SIZE: usize = 0x10000;

/// Size of a full cartridge image in bytes
pub const IMAGE_SIZE: usize = BANK_COUNT * BANK_SIZE;

/// A 16 KiB transfer window on the cartridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(u8);

impl Slot {
    /// Create a slot, returning `None` if the index is not addressable
    pub fn new(index: u8) -> Option<Self> {
        (index < SLOT_COUNT).then_some(Self(index))
    }

    /// Zero-based slot index
    pub fn index(self) -> u8 {
        self.0
    }

    /// Absolute number of the first block in this slot
    pub fn first_block(self) -> u16 {
        self.0 as u16 * BLOCKS_PER_SLOT as u16
    }

    /// Absolute block numbers covered by this slot
    pub fn blocks(self) -> Range<u16> {
        let first = self.first_block();
        first..first + BLOCKS_PER_SLOT as u16
    }

    /// Absolute sector numbers covered by this slot
    pub fn sectors(self) -> Range<u16> {
        let first = self.0 as u16 * SECTORS_PER_SLOT as u16;
        first..first + SECTORS_PER_SLOT as u16
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Sector containing an absolute block number
pub fn sector_of(block: u16) -> u16 {
    block / BLOCKS_PER_SECTOR as u16
}

/// Whether a block is the first of its sector (an erase is due before it)
pub fn starts_sector(block: u16) -> bool {
    block as usize % BLOCKS_PER_SECTOR == 0
}

/// 8-bit sum of all bytes, as computed by the reader firmware after a block write
pub fn block_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_bounds() {
        assert!(Slot::new(0).is_some());
        assert!(Slot::new(SLOT_COUNT - 1).is_some());
        assert!(Slot::new(SLOT_COUNT).is_none());
    }

    #[test]
    fn test_slot_ranges() {
        let slot = Slot::new(2).unwrap();
        assert_eq!(slot.first_block(), 128);
        assert_eq!(slot.blocks(), 128..192);
        assert_eq!(slot.sectors(), 8..12);
        assert_eq!(sector_of(slot.first_block()), slot.sectors().start);
    }

    #[test]
    fn test_sector_boundaries() {
        let starts: Vec<u16> = (0..64).filter(|&b| starts_sector(b)).collect();
        assert_eq!(starts, vec![0, 16, 32, 48]);
    }

    #[test]
    fn test_block_checksum_wraps() {
        assert_eq!(block_checksum(&[]), 0);
        assert_eq!(block_checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(block_checksum(&[0x01; 256]), 0x00);
    }
}
