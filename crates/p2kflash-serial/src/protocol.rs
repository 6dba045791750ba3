//! Reader board protocol constants and types
//!
//! Every command is 8 ASCII bytes. The board answers with a verbatim echo
//! of the command followed by a fixed, command-specific payload.

use crate::error::{ProtocolError, Result};

/// Length of every command on the wire
pub const COMMAND_LEN: usize = 8;
/// Length of the echo preceding each response
pub const ECHO_LEN: usize = COMMAND_LEN;

// Command opcodes
/// Read board identity string
pub const OP_READ_INFO: &str = "READINFO";
/// Read flash chip id
pub const OP_DEVICE_ID: &str = "DEVIDSST";
/// Read one 256-byte block
pub const OP_READ_BLOCK: &str = "RDBK";
/// Erase one 4096-byte sector
pub const OP_ERASE_SECTOR: &str = "ESST";
/// Program one 256-byte block
pub const OP_WRITE_BLOCK: &str = "WRBK";
/// Read one EEPROM byte
pub const OP_READ_EEPROM: &str = "RBEP";
/// Write one byte to an address
pub const OP_WRITE_BYTE: &str = "WR";

// Response payload lengths
/// READINFO payload
pub const INFO_LEN: usize = 16;
/// DEVIDSST payload
pub const DEVICE_ID_LEN: usize = 2;
/// ESST payload (erase cycle count, u16 LE)
pub const ERASE_RESULT_LEN: usize = 2;
/// WRBK payload (checksum)
pub const CHECKSUM_LEN: usize = 1;
/// RBEP payload
pub const EEPROM_LEN: usize = 1;

/// Chipset field a supported board reports
pub const SUPPORTED_CHIPSET: &str = "32u4";

/// Board identity parsed from a READINFO response
///
/// The board reports a 16-byte string such as `P2k-32u4-v1.0.0.`, made of
/// `-`-separated fields: board family, chipset, firmware version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardInfo {
    /// Identity string as received
    pub raw: String,
    /// Board family (first field)
    pub model: String,
    /// Microcontroller (second field)
    pub chipset: String,
    /// Firmware version (third field), if present
    pub firmware: Option<String>,
}

impl BoardInfo {
    /// Parse a READINFO payload
    ///
    /// Fails with [`ProtocolError::UnsupportedBoard`] unless the chipset
    /// field is `32u4`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let raw = String::from_utf8_lossy(payload)
            .trim_end_matches('\0')
            .to_string();
        let mut fields = raw.split('-');
        let model = fields.next().unwrap_or_default().to_string();
        let chipset = fields.next().unwrap_or_default().to_string();
        let firmware = fields.next().map(str::to_string);

        if chipset != SUPPORTED_CHIPSET {
            return Err(ProtocolError::UnsupportedBoard(raw));
        }

        Ok(Self {
            raw,
            model,
            chipset,
            firmware,
        })
    }
}

impl std::fmt::Display for BoardInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
