//! Media (cassette) images
//!
//! A media image is a sequence of 0x500-byte records, one per stored
//! block: a 0x30-byte zero leader, the 32-byte media header fragment, zero
//! padding up to 0x100, then the 1 KiB data payload.

use crate::error::{CodecError, Result};
use crate::image::RawImage;

use super::entry::DirectoryEntry;
use super::layout::{offset, FRAGMENT_OFFSET, FRAGMENT_SIZE, NAME_PART_LEN, PAYLOAD_SIZE};

/// Zero bytes before the header fragment
pub const LEADER_LEN: usize = 0x30;

/// Zero bytes between the header fragment and the payload
pub const PADDING_LEN: usize = 0x100 - 0x50;

/// Length of one media record
pub const RECORD_LEN: usize = LEADER_LEN + FRAGMENT_SIZE + PADDING_LEN + PAYLOAD_SIZE;

/// Reconstruct the media image of one directory entry
///
/// Blocks are emitted in chain order, without reordering or de-duplication.
/// The output depends only on the image and the entry, so repeated calls
/// give identical bytes. Bytes missing from a short image read as zero.
pub fn build_media_image(image: &RawImage, entry: &DirectoryEntry) -> Vec<u8> {
    let bytes = image.as_bytes();
    let mut media = Vec::with_capacity(entry.chain.len() * RECORD_LEN);

    for addr in &entry.chain {
        media.resize(media.len() + LEADER_LEN, 0x00);
        append_or_zero(&mut media, bytes, addr.fragment_offset(), FRAGMENT_SIZE);
        media.resize(media.len() + PADDING_LEN, 0x00);
        append_or_zero(&mut media, bytes, addr.payload_offset(), PAYLOAD_SIZE);
    }

    media
}

fn append_or_zero(out: &mut Vec<u8>, bytes: &[u8], start: usize, len: usize) {
    match bytes.get(start..start + len) {
        Some(chunk) => out.extend_from_slice(chunk),
        None => out.resize(out.len() + len, 0x00),
    }
}

/// One block of a media image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Media header fragment
    pub fragment: [u8; FRAGMENT_SIZE],
    /// Data payload
    pub payload: Vec<u8>,
}

impl MediaRecord {
    fn field(&self, header_offset: usize, len: usize) -> &[u8] {
        let at = header_offset - FRAGMENT_OFFSET;
        &self.fragment[at..at + len]
    }

    /// Declared file size carried in the fragment
    pub fn file_size(&self) -> u16 {
        let b = self.field(offset::FILE_SIZE, 2);
        u16::from_le_bytes([b[0], b[1]])
    }

    /// Filename carried in the fragment
    pub fn filename(&self) -> String {
        let mut name = self.field(offset::NAME_HEAD, NAME_PART_LEN).to_vec();
        name.extend_from_slice(self.field(offset::NAME_TAIL, NAME_PART_LEN));
        String::from_utf8_lossy(&name).into_owned()
    }
}

/// Split a media image into its records
pub fn parse_media_image(media: &[u8]) -> Result<Vec<MediaRecord>> {
    if media.is_empty() || media.len() % RECORD_LEN != 0 {
        return Err(CodecError::MalformedMedia {
            len: media.len(),
            record: RECORD_LEN,
        });
    }

    let records = media
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            let mut fragment = [0u8; FRAGMENT_SIZE];
            fragment.copy_from_slice(&record[LEADER_LEN..LEADER_LEN + FRAGMENT_SIZE]);
            MediaRecord {
                fragment,
                payload: record[RECORD_LEN - PAYLOAD_SIZE..].to_vec(),
            }
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BlockAddress;
    use crate::cartridge::IMAGE_SIZE;

    fn entry_with_chain(chain: Vec<BlockAddress>) -> DirectoryEntry {
        DirectoryEntry {
            vector: chain[0].vector(),
            filename: "TEST            ".into(),
            extension: "BAS".into(),
            size: 0,
            declared_blocks: chain.len() as u8,
            chain,
            invalid: false,
            load_address: 0,
            current_bank: 0,
            current_block: 0,
        }
    }

    #[test]
    fn test_record_length() {
        assert_eq!(RECORD_LEN, 0x500);
    }

    #[test]
    fn test_build_places_fragment_and_payload() {
        let mut data = vec![0u8; IMAGE_SIZE];
        let a = BlockAddress::new(0, 2);
        let b = BlockAddress::new(1, 0);
        data[a.fragment_offset()..a.fragment_offset() + FRAGMENT_SIZE].fill(0x11);
        data[a.payload_offset()..a.payload_offset() + PAYLOAD_SIZE].fill(0x22);
        data[b.fragment_offset()..b.fragment_offset() + FRAGMENT_SIZE].fill(0x33);
        data[b.payload_offset()..b.payload_offset() + PAYLOAD_SIZE].fill(0x44);
        let image = RawImage::from(data);

        let media = build_media_image(&image, &entry_with_chain(vec![a, b]));
        assert_eq!(media.len(), 2 * RECORD_LEN);
        assert!(media[..LEADER_LEN].iter().all(|&x| x == 0));
        assert!(media[0x30..0x50].iter().all(|&x| x == 0x11));
        assert!(media[0x50..0x100].iter().all(|&x| x == 0));
        assert!(media[0x100..0x500].iter().all(|&x| x == 0x22));
        assert!(media[0x530..0x550].iter().all(|&x| x == 0x33));
        assert!(media[0x600..0xA00].iter().all(|&x| x == 0x44));

        // Same inputs, same bytes
        assert_eq!(media, build_media_image(&image, &entry_with_chain(vec![a, b])));
    }

    #[test]
    fn test_build_keeps_chain_order() {
        let mut data = vec![0u8; IMAGE_SIZE];
        let a = BlockAddress::new(0, 0);
        let b = BlockAddress::new(0, 1);
        data[a.payload_offset()] = 0xAA;
        data[b.payload_offset()] = 0xBB;
        let image = RawImage::from(data);

        let media = build_media_image(&image, &entry_with_chain(vec![b, a, b]));
        let firsts: Vec<u8> = media.chunks(RECORD_LEN).map(|r| r[0x100]).collect();
        assert_eq!(firsts, vec![0xBB, 0xAA, 0xBB]);
    }

    #[test]
    fn test_parse_rejects_partial_records() {
        assert!(parse_media_image(&[]).is_err());
        assert_eq!(
            parse_media_image(&vec![0u8; RECORD_LEN + 1]),
            Err(CodecError::MalformedMedia {
                len: RECORD_LEN + 1,
                record: RECORD_LEN
            })
        );
    }

    #[test]
    fn test_parse_reads_fragment_fields() {
        let mut media = vec![0u8; RECORD_LEN];
        let frag = &mut media[LEADER_LEN..LEADER_LEN + FRAGMENT_SIZE];
        frag[2..4].copy_from_slice(&0x1234u16.to_le_bytes());
        frag[6..14].copy_from_slice(b"SPACE IN");
        frag[0x17..0x1F].copy_from_slice(b"VADERS  ");
        media[0x100] = 0x5A;

        let records = parse_media_image(&media).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_size(), 0x1234);
        assert_eq!(records[0].filename(), "SPACE INVADERS  ");
        assert_eq!(records[0].payload[0], 0x5A);
    }
}
