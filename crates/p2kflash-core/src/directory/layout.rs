//! Byte layout of the on-flash directory
//!
//! Each bank starts with a 60-byte table of start markers, followed by
//! 60 block headers of 0x40 bytes at 0x100, followed by 60 data payloads
//! of 1 KiB at 0x1000. All offsets used by the codec live here.

use crate::address::BlockAddress;

/// Directory slots (and data blocks) per bank
pub const DIRECTORY_SLOTS: usize = 60;

/// Offset of the first block header inside a bank
pub const HEADER_BASE: usize = 0x100;

/// Distance between consecutive block headers
pub const HEADER_STRIDE: usize = 0x40;

/// Offset of the first data payload inside a bank
pub const DATA_BASE: usize = 0x1000;

/// Size of one data payload
pub const PAYLOAD_SIZE: usize = 0x400;

/// Offset of the media header fragment inside a block header
pub const FRAGMENT_OFFSET: usize = 0x20;

/// Size of the media header fragment
pub const FRAGMENT_SIZE: usize = 0x20;

/// Marker value for an empty directory slot and for a chain terminator
pub const EMPTY: u8 = 0xFF;

/// Maximum chain length before a chain is considered broken
pub const MAX_CHAIN_LEN: usize = DIRECTORY_SLOTS * crate::cartridge::BANK_COUNT;

/// Offsets inside a 0x40-byte block header
pub mod offset {
    /// Bank this header belongs to
    pub const CURRENT_BANK: usize = 0x00;
    /// Load address, little-endian (low byte)
    pub const ADDRESS_LO: usize = 0x01;
    /// Load address, little-endian (high byte)
    pub const ADDRESS_HI: usize = 0x02;
    /// Bank of the next block in the chain
    pub const NEXT_BANK: usize = 0x03;
    /// Block of the next block in the chain
    pub const NEXT_BLOCK: usize = 0x04;
    /// 0x00 for a block that belongs to a file
    pub const MARKER: usize = 0x08;
    /// Block index of this header
    pub const CURRENT_BLOCK: usize = 0x09;
    /// Declared number of blocks in the file
    pub const BLOCK_COUNT: usize = 0x0A;
    /// Declared file size, little-endian u16
    pub const FILE_SIZE: usize = 0x22;
    /// First half of the filename
    pub const NAME_HEAD: usize = 0x26;
    /// File extension
    pub const EXTENSION: usize = 0x2E;
    /// Second half of the filename
    pub const NAME_TAIL: usize = 0x37;
}

/// Length of each filename half
pub const NAME_PART_LEN: usize = 8;

/// Length of the file extension
pub const EXTENSION_LEN: usize = 3;

/// Byte expected at [`offset::ADDRESS_LO`] of a formatted header
pub fn formatted_address_byte(slot: u8) -> u8 {
    slot.wrapping_mul(4).wrapping_add(0x10)
}

/// Offset of a directory start marker in a flat image
pub fn marker_offset(bank: u8, slot: u8) -> usize {
    BlockAddress::new(bank, 0).bank_offset() + slot as usize
}

/// Read-only view of one 0x40-byte block header
#[derive(Debug, Clone, Copy)]
pub struct HeaderView<'a> {
    bytes: &'a [u8],
}

impl<'a> HeaderView<'a> {
    /// View the header of `addr`, or `None` if the image is too short
    pub fn new(image: &'a [u8], addr: BlockAddress) -> Option<Self> {
        let start = addr.header_offset();
        image
            .get(start..start + HEADER_STRIDE)
            .map(|bytes| Self { bytes })
    }

    fn u16_at(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]])
    }

    /// Bank index stored in the header
    pub fn current_bank(&self) -> u8 {
        self.bytes[offset::CURRENT_BANK]
    }

    /// Block index stored in the header
    pub fn current_block(&self) -> u8 {
        self.bytes[offset::CURRENT_BLOCK]
    }

    /// Load address stored in the header
    pub fn load_address(&self) -> u16 {
        self.u16_at(offset::ADDRESS_LO)
    }

    /// Next (bank, block) pointer, `None` at the sentinel
    pub fn next(&self) -> Option<BlockAddress> {
        let bank = self.bytes[offset::NEXT_BANK];
        let block = self.bytes[offset::NEXT_BLOCK];
        if bank == EMPTY && block == EMPTY {
            None
        } else {
            Some(BlockAddress::new(bank, block))
        }
    }

    /// Marker byte (0x00 for blocks in use)
    pub fn marker(&self) -> u8 {
        self.bytes[offset::MARKER]
    }

    /// Declared number of blocks in the file
    pub fn block_count(&self) -> u8 {
        self.bytes[offset::BLOCK_COUNT]
    }

    /// Declared file size
    pub fn file_size(&self) -> u16 {
        self.u16_at(offset::FILE_SIZE)
    }

    /// Both filename halves, concatenated
    pub fn filename(&self) -> [u8; 2 * NAME_PART_LEN] {
        let mut name = [0u8; 2 * NAME_PART_LEN];
        name[..NAME_PART_LEN]
            .copy_from_slice(&self.bytes[offset::NAME_HEAD..offset::NAME_HEAD + NAME_PART_LEN]);
        name[NAME_PART_LEN..]
            .copy_from_slice(&self.bytes[offset::NAME_TAIL..offset::NAME_TAIL + NAME_PART_LEN]);
        name
    }

    /// File extension
    pub fn extension(&self) -> [u8; EXTENSION_LEN] {
        let mut ext = [0u8; EXTENSION_LEN];
        ext.copy_from_slice(&self.bytes[offset::EXTENSION..offset::EXTENSION + EXTENSION_LEN]);
        ext
    }

    /// Raw header byte
    pub fn byte(&self, at: usize) -> u8 {
        self.bytes[at]
    }
}

/// Mutable view of one block header, used when formatting images
#[derive(Debug)]
pub struct HeaderMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> HeaderMut<'a> {
    /// View the header of `addr` mutably, or `None` if the image is too short
    pub fn new(image: &'a mut [u8], addr: BlockAddress) -> Option<Self> {
        let start = addr.header_offset();
        image
            .get_mut(start..start + HEADER_STRIDE)
            .map(|bytes| Self { bytes })
    }

    /// Write the bank index and formatted address pattern
    pub fn format(&mut self, bank: u8, slot: u8) {
        self.bytes[offset::CURRENT_BANK] = bank;
        self.bytes[offset::ADDRESS_LO] = formatted_address_byte(slot);
        self.bytes[offset::ADDRESS_HI] = 0x00;
    }

    /// Write the chain pointer, `None` for the sentinel
    pub fn set_next(&mut self, next: Option<BlockAddress>) {
        let (bank, block) = next.map_or((EMPTY, EMPTY), |n| (n.bank, n.block));
        self.bytes[offset::NEXT_BANK] = bank;
        self.bytes[offset::NEXT_BLOCK] = block;
    }

    /// Mark the block as used by a file
    pub fn set_in_use(&mut self, block: u8, block_count: u8) {
        self.bytes[offset::MARKER] = 0x00;
        self.bytes[offset::CURRENT_BLOCK] = block;
        self.bytes[offset::BLOCK_COUNT] = block_count;
    }

    /// Copy the media header fragment into the header
    pub fn set_fragment(&mut self, fragment: &[u8; FRAGMENT_SIZE]) {
        self.bytes[FRAGMENT_OFFSET..FRAGMENT_OFFSET + FRAGMENT_SIZE].copy_from_slice(fragment);
    }
}
