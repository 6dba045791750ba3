//! Raw cartridge images

use core::ops::Range;

/// Byte contents of (part of) a cartridge
///
/// A full image holds 8 banks of 64 KiB. Images returned by a slot read
/// hold a single 16 KiB window. The buffer is never modified in place; the
/// directory codec only ever borrows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawImage {
    data: Vec<u8>,
}

impl RawImage {
    /// Wrap a byte buffer
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Bytes in `range`, or `None` if the image is too short
    pub fn get(&self, range: Range<usize>) -> Option<&[u8]> {
        self.data.get(range)
    }

    /// The bytes zero-padded to `len`
    ///
    /// Returns `None` if the image is already longer than `len`.
    pub fn padded_to(self, len: usize) -> Option<Vec<u8>> {
        if self.data.len() > len {
            return None;
        }
        let mut padded = self.data;
        padded.resize(len, 0x00);
        Some(padded)
    }
}

impl From<Vec<u8>> for RawImage {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for RawImage {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl AsRef<[u8]> for RawImage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding() {
        let image = RawImage::from(vec![1u8, 2, 3]);
        assert_eq!(image.clone().padded_to(8).unwrap(), vec![1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(image.clone().padded_to(3).unwrap(), vec![1, 2, 3]);
        assert!(image.padded_to(2).is_none());
    }

    #[test]
    fn test_get_short_image() {
        let image = RawImage::from(vec![0u8; 16]);
        assert_eq!(image.get(8..16).map(<[u8]>::len), Some(8));
        assert!(image.get(8..17).is_none());
    }
}
