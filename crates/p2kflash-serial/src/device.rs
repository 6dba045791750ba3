//! Flash protocol for the SST39SF0x0 cartridge
//!
//! [`Cartridge`] turns command channel exchanges into chip operations:
//! identification, sector erase, block program with checksum check and
//! block read. It does not decide when sectors are erased; callers cross
//! sector boundaries themselves.

use p2kflash_core::cartridge::{block_checksum, BLOCK_SIZE};
use p2kflash_core::ChipIdentity;

use crate::channel::{ChannelConfig, CommandChannel};
use crate::command::Command;
use crate::delay::{Delay, ThreadDelay};
use crate::error::{ProtocolError, Result};
use crate::protocol::*;
use crate::transport::Transport;

/// Reader board with an SST39SF0x0 cartridge attached
pub struct Cartridge<T, D = ThreadDelay> {
    channel: CommandChannel<T, D>,
}

impl<T: Transport> Cartridge<T> {
    /// Wrap a transport, sleeping the current thread while polling
    pub fn new(transport: T, config: ChannelConfig) -> Self {
        Self {
            channel: CommandChannel::new(transport, config),
        }
    }
}

impl<T: Transport, D: Delay> Cartridge<T, D> {
    /// Wrap an existing command channel
    pub fn from_channel(channel: CommandChannel<T, D>) -> Self {
        Self { channel }
    }

    /// Underlying command channel
    pub fn channel(&mut self) -> &mut CommandChannel<T, D> {
        &mut self.channel
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.channel.into_inner()
    }

    /// Read and parse the board identity string
    pub fn board_info(&mut self) -> Result<BoardInfo> {
        let payload = self
            .channel
            .send_and_capture(&Command::read_info(), INFO_LEN)?;
        let info = BoardInfo::parse(&payload)?;
        log::info!("Board: {}", info);
        Ok(info)
    }

    /// Read the chip id without checking it
    pub fn read_chip_id(&mut self) -> Result<ChipIdentity> {
        let payload = self
            .channel
            .send_and_capture(&Command::device_id(), DEVICE_ID_LEN)?;
        let chip = ChipIdentity::from_devid_response([payload[0], payload[1]]);
        log::debug!("Chip id: {}", chip);
        Ok(chip)
    }

    /// Read the chip id and check it against the supported family
    pub fn identify_chip(&mut self) -> Result<ChipIdentity> {
        let chip = self.read_chip_id()?;
        if !chip.is_supported() {
            log::error!("Unsupported flash chip {}", chip);
            return Err(ProtocolError::UnsupportedChip(chip));
        }
        log::info!("Found {}", chip);
        Ok(chip)
    }

    /// Erase a 4096-byte sector, returning the erase cycle count
    pub fn erase_sector(&mut self, sector: u16) -> Result<u16> {
        let command = Command::erase_sector(sector)?;
        let payload = self
            .channel
            .send_and_capture(&command, ERASE_RESULT_LEN)?;
        let cycles = u16::from_le_bytes([payload[0], payload[1]]);
        log::debug!("Erased sector {} in {} cycles", sector, cycles);
        Ok(cycles)
    }

    /// Program one 256-byte block and check the returned checksum
    ///
    /// `block` is the absolute block number. Residual bytes are flushed
    /// after a successful write; on failure the caller decides.
    pub fn program_block(&mut self, block: u16, data: &[u8; BLOCK_SIZE]) -> Result<()> {
        let command = Command::write_block(block)?;
        self.channel.send(&command)?;
        self.channel.send_raw(&command, data)?;

        let expected = block_checksum(data);
        let received = self.channel.capture(&command, CHECKSUM_LEN)?[0];
        if received != expected {
            log::error!(
                "Invalid checksum for block {}: computed 0x{:02X}, received 0x{:02X}",
                block,
                expected,
                received
            );
            return Err(ProtocolError::ChecksumMismatch {
                block,
                expected,
                received,
            });
        }
        log::debug!("Valid checksum 0x{:02X} for block {}", expected, block);

        self.channel.flush_residual();
        Ok(())
    }

    /// Read one 256-byte block
    pub fn read_block(&mut self, block: u16) -> Result<[u8; BLOCK_SIZE]> {
        let command = Command::read_block(block)?;
        let payload = self.channel.send_and_capture(&command, BLOCK_SIZE)?;
        let mut data = [0u8; BLOCK_SIZE];
        data.copy_from_slice(&payload);
        Ok(data)
    }

    /// Read one EEPROM byte
    pub fn read_eeprom_byte(&mut self, address: u32) -> Result<u8> {
        let command = Command::read_eeprom(address)?;
        Ok(self.channel.send_and_capture(&command, EEPROM_LEN)?[0])
    }

    /// Read a little-endian u32 stored in four consecutive EEPROM bytes
    pub fn read_eeprom_u32(&mut self, address: u16) -> Result<u32> {
        let base = address as u32;
        // Validate the whole range before the first exchange
        Command::read_eeprom(base + 3)?;

        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.read_eeprom_byte(base + i as u32)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    /// Write one byte to an address on the board
    pub fn write_address(&mut self, address: u16, value: u8) -> Result<()> {
        self.channel.send(&Command::write_address(address, value))
    }
}
