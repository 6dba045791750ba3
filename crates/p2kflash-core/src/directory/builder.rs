//! Building cartridge images from media images

use crate::address::BlockAddress;
use crate::cartridge::{BANK_COUNT, IMAGE_SIZE};
use crate::error::{CodecError, Result};
use crate::image::RawImage;

use super::layout::{marker_offset, HeaderMut, DIRECTORY_SLOTS, PAYLOAD_SIZE};
use super::media::{parse_media_image, RECORD_LEN};

const TOTAL_BLOCKS: usize = BANK_COUNT * DIRECTORY_SLOTS;

/// Assembles a formatted cartridge image file by file
///
/// Blocks are allocated in order, bank by bank, so a file may continue
/// into the next bank. The resulting image decodes with
/// [`read_directory`](super::read_directory) and passes
/// [`validate_directory_layout`](super::validate_directory_layout).
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    data: Vec<u8>,
    next_free: usize,
    markers: [usize; BANK_COUNT],
}

impl ImageBuilder {
    /// Start from an erased, formatted image
    pub fn new() -> Self {
        let mut data = vec![0xFFu8; IMAGE_SIZE];
        for bank in 0..BANK_COUNT as u8 {
            for slot in 0..DIRECTORY_SLOTS as u8 {
                if let Some(mut header) = HeaderMut::new(&mut data, BlockAddress::new(bank, slot)) {
                    header.format(bank, slot);
                }
            }
        }
        Self {
            data,
            next_free: 0,
            markers: [0; BANK_COUNT],
        }
    }

    /// Blocks not yet allocated
    pub fn free_blocks(&self) -> usize {
        TOTAL_BLOCKS - self.next_free
    }

    fn address(index: usize) -> BlockAddress {
        BlockAddress::new(
            (index / DIRECTORY_SLOTS) as u8,
            (index % DIRECTORY_SLOTS) as u8,
        )
    }

    /// Store one media image, returning the block where it starts
    pub fn add_media(&mut self, media: &[u8]) -> Result<BlockAddress> {
        let records = parse_media_image(media)?;
        if records.len() > u8::MAX as usize {
            return Err(CodecError::MalformedMedia {
                len: media.len(),
                record: RECORD_LEN,
            });
        }
        if records.len() > self.free_blocks() {
            return Err(CodecError::ImageFull {
                needed: records.len(),
                free: self.free_blocks(),
            });
        }

        let first = self.next_free;
        let count = records.len() as u8;
        for (i, record) in records.iter().enumerate() {
            let addr = Self::address(first + i);
            let next = (i + 1 < records.len()).then(|| Self::address(first + i + 1));

            let payload = addr.payload_offset();
            self.data[payload..payload + PAYLOAD_SIZE].copy_from_slice(&record.payload);

            if let Some(mut header) = HeaderMut::new(&mut self.data, addr) {
                header.set_fragment(&record.fragment);
                header.set_in_use(addr.block, count);
                header.set_next(next);
            }
        }

        let start = Self::address(first);
        let bank = start.bank as usize;
        self.data[marker_offset(start.bank, self.markers[bank] as u8)] = start.block;
        self.markers[bank] += 1;
        self.next_free += records.len();

        log::debug!(
            "stored {} block(s) of \"{}\" at {}",
            count,
            records[0].filename().trim_end(),
            start
        );
        Ok(start)
    }

    /// Finish and return the image
    pub fn finish(self) -> RawImage {
        RawImage::from(self.data)
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
