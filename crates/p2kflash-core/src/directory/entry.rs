//! Directory scanning and entry decoding

use crate::address::BlockAddress;
use crate::cartridge::{BANK_COUNT, IMAGE_SIZE};
use crate::error::{CodecError, Result};
use crate::image::RawImage;

use super::layout::{
    formatted_address_byte, marker_offset, offset, HeaderView, DIRECTORY_SLOTS, EMPTY,
    MAX_CHAIN_LEN, PAYLOAD_SIZE,
};

/// One file stored in the cartridge directory
///
/// Entries are snapshots of an image. If the image changes they must be
/// decoded again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Start vector (bank in the high byte, block in the low byte)
    pub vector: u16,
    /// 16-character filename, as stored
    pub filename: String,
    /// 3-character extension
    pub extension: String,
    /// Declared file size in bytes
    pub size: u16,
    /// Declared number of blocks
    pub declared_blocks: u8,
    /// Blocks visited by following the chain pointers
    pub chain: Vec<BlockAddress>,
    /// Set when the declared block count does not match the chain length
    pub invalid: bool,
    /// Load address from the first header
    pub load_address: u16,
    /// Bank recorded in the first header
    pub current_bank: u8,
    /// Block recorded in the first header
    pub current_block: u8,
}

impl DirectoryEntry {
    /// First block of the file
    pub fn start(&self) -> BlockAddress {
        BlockAddress::from_vector(self.vector)
    }

    /// Filename without trailing padding
    pub fn display_name(&self) -> &str {
        self.filename.trim_end_matches(|c: char| c == ' ' || c == '\0')
    }

    /// Chain rendered as `bb.kk->bb.kk`
    pub fn chain_string(&self) -> String {
        self.chain
            .iter()
            .map(|addr| addr.to_string())
            .collect::<Vec<_>>()
            .join("->")
    }
}

/// Collect the start vector of every used directory slot
///
/// Each bank starts with a table of 60 marker bytes. 0xFF means empty,
/// any other value is the block where a file begins in that bank. Banks
/// missing from a short image are skipped.
pub fn scan_directory(image: &RawImage) -> Vec<BlockAddress> {
    let bytes = image.as_bytes();
    let mut vectors = Vec::new();

    for bank in 0..BANK_COUNT as u8 {
        for slot in 0..DIRECTORY_SLOTS as u8 {
            match bytes.get(marker_offset(bank, slot)) {
                Some(&EMPTY) | None => {}
                Some(&block) => vectors.push(BlockAddress::new(bank, block)),
            }
        }
    }

    log::debug!("directory scan found {} start vector(s)", vectors.len());
    vectors
}

/// Header of a chain element, after checking it can be used
fn chain_header<'a>(
    bytes: &'a [u8],
    vector: u16,
    at: BlockAddress,
    steps: usize,
) -> Result<HeaderView<'a>> {
    if !at.in_grid() {
        return Err(CodecError::BrokenChain { vector, at, steps });
    }
    if bytes.len() < at.payload_offset() + PAYLOAD_SIZE {
        return Err(CodecError::TruncatedHeader { vector, at });
    }
    HeaderView::new(bytes, at).ok_or(CodecError::TruncatedHeader { vector, at })
}

/// Decode the file starting at `start`
///
/// Follows the next-bank/next-block pointers until the (0xFF, 0xFF)
/// sentinel. A declared block count that disagrees with the chain length
/// sets [`DirectoryEntry::invalid`] but still returns the entry.
///
/// Only blocks 0..60 of a bank carry headers; from block 60 on the header
/// area overlaps the data payloads. A start marker of 60..=0xFE is
/// therefore not decoded and fails as [`CodecError::BrokenChain`] with
/// `steps == 0`.
pub fn decode_entry(image: &RawImage, start: BlockAddress) -> Result<DirectoryEntry> {
    let bytes = image.as_bytes();
    let vector = start.vector();
    let head = chain_header(bytes, vector, start, 0)?;

    let mut chain = vec![start];
    let mut next = head.next();
    while let Some(at) = next {
        if chain.len() >= MAX_CHAIN_LEN {
            return Err(CodecError::BrokenChain {
                vector,
                at,
                steps: chain.len(),
            });
        }
        let view = chain_header(bytes, vector, at, chain.len())?;
        chain.push(at);
        next = view.next();
    }

    let declared_blocks = head.block_count();
    let invalid = declared_blocks as usize != chain.len();
    if invalid {
        log::warn!(
            "entry {:#06X}: header declares {} block(s), chain has {}",
            vector,
            declared_blocks,
            chain.len()
        );
    }

    Ok(DirectoryEntry {
        vector,
        filename: String::from_utf8_lossy(&head.filename()).into_owned(),
        extension: String::from_utf8_lossy(&head.extension()).into_owned(),
        size: head.file_size(),
        declared_blocks,
        chain,
        invalid,
        load_address: head.load_address(),
        current_bank: head.current_bank(),
        current_block: head.current_block(),
    })
}

/// Scan the directory and decode every entry
///
/// Results are returned per entry so that one broken chain does not hide
/// the remaining files.
pub fn read_directory(image: &RawImage) -> Vec<Result<DirectoryEntry>> {
    scan_directory(image)
        .into_iter()
        .map(|start| decode_entry(image, start))
        .collect()
}

/// Check that every block header carries the formatted bank/address pattern
///
/// A cartridge formatted for this directory has, for each (bank, slot),
/// the bank index at +0, `slot * 4 + 0x10` at +1 and zero at +2. Any other
/// value points at a corrupted or foreign image whose scan results should
/// not be trusted.
pub fn validate_directory_layout(image: &RawImage) -> Result<()> {
    let bytes = image.as_bytes();
    if bytes.len() < IMAGE_SIZE {
        return Err(CodecError::ImageSize {
            len: bytes.len(),
            expected: IMAGE_SIZE,
        });
    }

    for bank in 0..BANK_COUNT as u8 {
        for slot in 0..DIRECTORY_SLOTS as u8 {
            let addr = BlockAddress::new(bank, slot);
            let view = HeaderView::new(bytes, addr)
                .ok_or(CodecError::TruncatedHeader {
                    vector: addr.vector(),
                    at: addr,
                })?;
            let checks = [
                (offset::CURRENT_BANK, bank),
                (offset::ADDRESS_LO, formatted_address_byte(slot)),
                (offset::ADDRESS_HI, 0x00),
            ];
            for (at, expected) in checks {
                let found = view.byte(at);
                if found != expected {
                    return Err(CodecError::LayoutMismatch {
                        bank,
                        slot,
                        offset: at,
                        expected,
                        found,
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::layout::HeaderMut;

    /// Blank formatted image with one single-block file at bank 0, block 0
    fn single_file_image(declared_blocks: u8) -> RawImage {
        let mut data = vec![0xFFu8; IMAGE_SIZE];
        for bank in 0..BANK_COUNT as u8 {
            for slot in 0..DIRECTORY_SLOTS as u8 {
                HeaderMut::new(&mut data, BlockAddress::new(bank, slot))
                    .unwrap()
                    .format(bank, slot);
            }
        }

        data[marker_offset(0, 0)] = 0x00;
        let start = BlockAddress::new(0, 0).header_offset();
        let h = &mut data[start..start + 0x40];
        h[offset::BLOCK_COUNT] = declared_blocks;
        h[offset::CURRENT_BLOCK] = 0x00;
        h[offset::FILE_SIZE..offset::FILE_SIZE + 2].copy_from_slice(&0x0321u16.to_le_bytes());
        h[offset::NAME_HEAD..offset::NAME_HEAD + 8].copy_from_slice(b"DEFENDER");
        h[offset::NAME_TAIL..offset::NAME_TAIL + 8].copy_from_slice(b"        ");
        h[offset::EXTENSION..offset::EXTENSION + 3].copy_from_slice(b"PRG");
        RawImage::from(data)
    }

    fn link(image: &mut Vec<u8>, from: BlockAddress, to: BlockAddress) {
        let h = from.header_offset();
        image[h + offset::NEXT_BANK] = to.bank;
        image[h + offset::NEXT_BLOCK] = to.block;
    }

    #[test]
    fn test_scan_finds_marked_slots() {
        let image = single_file_image(1);
        assert_eq!(scan_directory(&image), vec![BlockAddress::new(0, 0)]);
    }

    #[test]
    fn test_scan_short_image() {
        let mut data = vec![0xFFu8; 0x100];
        data[3] = 0x07;
        assert_eq!(
            scan_directory(&RawImage::from(data)),
            vec![BlockAddress::new(0, 7)]
        );
    }

    #[test]
    fn test_decode_valid_entry() {
        let image = single_file_image(1);
        let start = scan_directory(&image)[0];
        let entry = decode_entry(&image, start).unwrap();

        assert_eq!(entry.filename, "DEFENDER        ");
        assert_eq!(entry.display_name(), "DEFENDER");
        assert_eq!(entry.extension, "PRG");
        assert_eq!(entry.size, 0x0321);
        assert_eq!(entry.declared_blocks, 1);
        assert_eq!(entry.chain, vec![BlockAddress::new(0, 0)]);
        assert!(!entry.invalid);
        assert_eq!((entry.current_bank, entry.current_block), (0, 0));
    }

    #[test]
    fn test_start_past_header_area_is_broken() {
        let mut data = single_file_image(1).into_bytes();
        data[marker_offset(0, 0)] = DIRECTORY_SLOTS as u8;
        let image = RawImage::from(data);

        let start = scan_directory(&image)[0];
        assert_eq!(start, BlockAddress::new(0, DIRECTORY_SLOTS as u8));
        assert!(matches!(
            decode_entry(&image, start),
            Err(CodecError::BrokenChain { steps: 0, .. })
        ));
    }

    #[test]
    fn test_decode_count_mismatch_is_flagged_not_dropped() {
        let image = single_file_image(2);
        let entry = decode_entry(&image, BlockAddress::new(0, 0)).unwrap();
        assert!(entry.invalid);
        assert_eq!(entry.chain.len(), 1);
    }

    #[test]
    fn test_decode_follows_chain_across_banks() {
        let mut data = single_file_image(3).into_bytes();
        link(&mut data, BlockAddress::new(0, 0), BlockAddress::new(0, 5));
        link(&mut data, BlockAddress::new(0, 5), BlockAddress::new(2, 1));
        let entry = decode_entry(&RawImage::from(data), BlockAddress::new(0, 0)).unwrap();

        assert_eq!(entry.chain_string(), "00.00->00.05->02.01");
        assert!(!entry.invalid);
    }

    #[test]
    fn test_cyclic_chain_is_broken() {
        let mut data = single_file_image(1).into_bytes();
        link(&mut data, BlockAddress::new(0, 0), BlockAddress::new(0, 1));
        link(&mut data, BlockAddress::new(0, 1), BlockAddress::new(0, 0));
        let err = decode_entry(&RawImage::from(data), BlockAddress::new(0, 0)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BrokenChain { steps, .. } if steps == MAX_CHAIN_LEN
        ));
    }

    #[test]
    fn test_pointer_outside_grid_is_broken() {
        let mut data = single_file_image(2).into_bytes();
        link(&mut data, BlockAddress::new(0, 0), BlockAddress::new(9, 0));
        let err = decode_entry(&RawImage::from(data), BlockAddress::new(0, 0)).unwrap_err();
        assert_eq!(
            err,
            CodecError::BrokenChain {
                vector: 0x0000,
                at: BlockAddress::new(9, 0),
                steps: 1
            }
        );
    }

    #[test]
    fn test_truncated_image() {
        let data = single_file_image(1).into_bytes()[..0x1200].to_vec();
        let err = decode_entry(&RawImage::from(data), BlockAddress::new(0, 3)).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedHeader { .. }));
    }

    #[test]
    fn test_read_directory_keeps_going_past_broken_entries() {
        let mut data = single_file_image(1).into_bytes();
        data[marker_offset(1, 0)] = 0x03;
        link(&mut data, BlockAddress::new(1, 3), BlockAddress::new(0x20, 0x20));
        let results = read_directory(&RawImage::from(data));

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_layout_validation() {
        let image = single_file_image(1);
        assert_eq!(validate_directory_layout(&image), Ok(()));

        let mut data = image.into_bytes();
        data[BlockAddress::new(3, 7).header_offset() + offset::ADDRESS_LO] = 0x00;
        assert_eq!(
            validate_directory_layout(&RawImage::from(data)),
            Err(CodecError::LayoutMismatch {
                bank: 3,
                slot: 7,
                offset: offset::ADDRESS_LO,
                expected: 0x2C,
                found: 0x00
            })
        );
    }

    #[test]
    fn test_layout_validation_rejects_short_image() {
        let err = validate_directory_layout(&RawImage::from(vec![0u8; 0x4000])).unwrap_err();
        assert!(matches!(err, CodecError::ImageSize { len: 0x4000, .. }));
    }
}
