//! Flash chip identification
//!
//! Only the SST39SF0x0 family is supported. The reader firmware answers
//! `DEVIDSST` with two raw bytes which are turned into a 16-bit id by
//! [`ChipIdentity::from_devid_response`].

use core::fmt;

/// Known device ids and their part names
pub const SUPPORTED_CHIPS: [(u16, &str); 3] = [
    (0xBFB5, "SST39SF010A"),
    (0xBFB6, "SST39SF020A"),
    (0xBFB7, "SST39SF040"),
];

/// 16-bit flash device identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipIdentity(u16);

impl ChipIdentity {
    /// Wrap a raw device id
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Decode the two-byte `DEVIDSST` response
    ///
    /// This reproduces the host arithmetic the board was qualified against:
    /// both bytes are taken as signed, the first is incremented by one and
    /// shifted into the high byte, the second is added, and the sum wraps to
    /// 16 bits. For a second byte of 0x80 or above the +1 cancels the borrow
    /// from sign extension and the datasheet id comes out unchanged; below
    /// 0x80 the high byte is off by one. Do not simplify this.
    pub fn from_devid_response(response: [u8; 2]) -> Self {
        let high = (response[0] as i8 as i32 + 1) * 256;
        let low = response[1] as i8 as i32;
        Self((high + low) as u16)
    }

    /// Raw 16-bit id
    pub fn id(self) -> u16 {
        self.0
    }

    /// Whether this id belongs to the accepted chip family
    pub fn is_supported(self) -> bool {
        self.name().is_some()
    }

    /// Part name for a supported id
    pub fn name(self) -> Option<&'static str> {
        SUPPORTED_CHIPS
            .iter()
            .find(|(id, _)| *id == self.0)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for ChipIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:04X})", name, self.0),
            None => write!(f, "unknown chip (0x{:04X})", self.0),
        }
    }
}
