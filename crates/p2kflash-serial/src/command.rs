//! Fixed-width ASCII commands

use std::fmt;

use crate::error::{ProtocolError, Result};
use crate::protocol::*;

/// One 8-byte command as it goes on the wire
///
/// The length invariant is enforced at construction; every typed
/// constructor zero-pads its hex arguments to four (or two) digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command([u8; COMMAND_LEN]);

impl Command {
    /// Build a command from exactly 8 printable ASCII characters
    pub fn new(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.len() != COMMAND_LEN || !bytes.iter().all(|b| b.is_ascii_graphic()) {
            return Err(ProtocolError::InvalidCommand(text.to_string()));
        }
        let mut raw = [0u8; COMMAND_LEN];
        raw.copy_from_slice(bytes);
        Ok(Self(raw))
    }

    /// `OPCDaaaa`, rejecting arguments wider than four hex digits
    fn with_hex(opcode: &'static str, argument: u32) -> Result<Self> {
        let argument = u16::try_from(argument)
            .map_err(|_| ProtocolError::InvalidAddress { opcode, argument })?;
        Self::new(&format!("{}{:04X}", opcode, argument))
    }

    /// `READINFO`
    pub fn read_info() -> Self {
        Self(*b"READINFO")
    }

    /// `DEVIDSST`
    pub fn device_id() -> Self {
        Self(*b"DEVIDSST")
    }

    /// `RDBKaaaa`, where the argument is `block * 0x100`
    pub fn read_block(block: u16) -> Result<Self> {
        Self::with_hex(OP_READ_BLOCK, block as u32 * 0x100)
    }

    /// `ESSTaaaa`, where the argument is the first block of the sector
    pub fn erase_sector(sector: u16) -> Result<Self> {
        Self::with_hex(
            OP_ERASE_SECTOR,
            sector as u32 * p2kflash_core::cartridge::BLOCKS_PER_SECTOR as u32,
        )
    }

    /// `WRBKaaaa`, where the argument is the absolute block number
    pub fn write_block(block: u16) -> Result<Self> {
        Self::with_hex(OP_WRITE_BLOCK, block as u32)
    }

    /// `RBEPaaaa`
    pub fn read_eeprom(address: u32) -> Result<Self> {
        Self::with_hex(OP_READ_EEPROM, address)
    }

    /// `WRaaaabb`
    pub fn write_address(address: u16, value: u8) -> Self {
        let mut raw = [0u8; COMMAND_LEN];
        raw.copy_from_slice(format!("{}{:04X}{:02X}", OP_WRITE_BYTE, address, value).as_bytes());
        Self(raw)
    }

    /// Wire bytes
    pub fn as_bytes(&self) -> &[u8; COMMAND_LEN] {
        &self.0
    }

    /// Opcode prefix (the letters before the hex argument)
    pub fn opcode(&self) -> &str {
        const KNOWN: [&str; 7] = [
            OP_READ_INFO,
            OP_DEVICE_ID,
            OP_READ_BLOCK,
            OP_ERASE_SECTOR,
            OP_WRITE_BLOCK,
            OP_READ_EEPROM,
            OP_WRITE_BYTE,
        ];
        let text = self.as_str();
        KNOWN
            .into_iter()
            .find(|op| text.starts_with(op))
            .unwrap_or(text)
    }

    fn as_str(&self) -> &str {
        // Construction guarantees printable ASCII
        std::str::from_utf8(&self.0).unwrap_or("????????")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_is_eight_bytes() {
        let commands = [
            Command::read_info(),
            Command::device_id(),
            Command::read_block(0).unwrap(),
            Command::read_block(0xFF).unwrap(),
            Command::erase_sector(0).unwrap(),
            Command::erase_sector(15).unwrap(),
            Command::write_block(0x0101).unwrap(),
            Command::read_eeprom(3).unwrap(),
            Command::write_address(0x1234, 0x05),
        ];
        for command in commands {
            assert_eq!(command.as_bytes().len(), COMMAND_LEN);
            assert_eq!(command.to_string().len(), COMMAND_LEN);
        }
    }

    #[test]
    fn test_hex_arguments_are_zero_padded() {
        assert_eq!(Command::read_block(1).unwrap().to_string(), "RDBK0100");
        assert_eq!(Command::read_block(0x40).unwrap().to_string(), "RDBK4000");
        assert_eq!(Command::erase_sector(1).unwrap().to_string(), "ESST0010");
        assert_eq!(Command::write_block(5).unwrap().to_string(), "WRBK0005");
        assert_eq!(Command::read_eeprom(0x0A).unwrap().to_string(), "RBEP000A");
        assert_eq!(Command::write_address(0xA, 0xB).to_string(), "WR000A0B");
    }

    #[test]
    fn test_out_of_range_arguments() {
        assert!(matches!(
            Command::read_block(0x100),
            Err(ProtocolError::InvalidAddress {
                opcode: OP_READ_BLOCK,
                argument: 0x10000
            })
        ));
        assert!(Command::erase_sector(0x1000).is_err());
        assert!(Command::read_eeprom(0x10000).is_err());
        assert!(Command::write_block(0xFFFF).is_ok());
    }

    #[test]
    fn test_new_validates_length() {
        assert!(Command::new("READINFO").is_ok());
        assert!(matches!(
            Command::new("READ"),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(Command::new("READINFO1").is_err());
        assert!(Command::new("READ\nNFO").is_err());
    }

    #[test]
    fn test_opcode() {
        assert_eq!(Command::read_block(2).unwrap().opcode(), "RDBK");
        assert_eq!(Command::write_block(2).unwrap().opcode(), "WRBK");
        assert_eq!(Command::write_address(0xBEEF, 1).opcode(), "WR");
        assert_eq!(Command::read_info().opcode(), "READINFO");
    }
}
