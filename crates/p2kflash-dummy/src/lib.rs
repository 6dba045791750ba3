//! p2kflash-dummy - In-memory reader board emulator for testing
//!
//! [`DummyBoard`] implements [`Transport`] and answers the reader board
//! command set from an emulated SST39SF0x0 flash and EEPROM. Responses
//! appear in the receive buffer as soon as the command is written.
//!
//! Clones share the same board, so a test can hand one clone to a job and
//! keep another to inspect flash contents and the command history.
//! [`Faults`] injects the misbehaviour the protocol layer must survive.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use p2kflash_core::cartridge::{block_checksum, BLOCK_SIZE, SECTOR_SIZE};
use p2kflash_serial::protocol::*;
use p2kflash_serial::{ProtocolError, Result, Transport};

/// Configuration for the dummy board
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// READINFO payload
    pub info: [u8; INFO_LEN],
    /// Raw DEVIDSST payload (before the id decode)
    pub chip_response: [u8; DEVICE_ID_LEN],
    /// Flash size in bytes
    pub size: usize,
    /// EEPROM size in bytes
    pub eeprom_size: usize,
    /// Cycle count reported for every erase
    pub erase_cycles: u16,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            info: *b"P2k-32u4-v1.0.0.",
            chip_response: [0xBF, 0xB5], // SST39SF010A
            size: 128 * 1024,
            eeprom_size: 1024,
            erase_cycles: 0x0120,
        }
    }
}

/// Misbehaviour to inject
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Flip one bit of the echo for commands starting with this opcode
    pub bad_echo: Option<String>,
    /// Blocks whose write checksum is reported with one bit flipped
    pub bad_checksum_blocks: Vec<u16>,
    /// Blocks whose data is acknowledged but never programmed
    pub lost_blocks: Vec<u16>,
    /// Erase commands are acknowledged but leave the sector unchanged
    pub ignore_erase: bool,
    /// Bytes sent after every block write checksum
    pub trailing_noise: Vec<u8>,
    /// Never answer anything
    pub silent: bool,
}

#[derive(Debug)]
struct State {
    config: DummyConfig,
    faults: Faults,
    flash: Vec<u8>,
    eeprom: Vec<u8>,
    pokes: Vec<(u16, u8)>,
    open: bool,
    opened: usize,
    input: Vec<u8>,
    pending_write: Option<u16>,
    rx: VecDeque<u8>,
    history: Vec<String>,
}

impl State {
    fn handle_input(&mut self, data: &[u8]) {
        self.input.extend_from_slice(data);
        loop {
            if let Some(block) = self.pending_write {
                if self.input.len() < BLOCK_SIZE {
                    return;
                }
                let payload: Vec<u8> = self.input.drain(..BLOCK_SIZE).collect();
                self.pending_write = None;
                self.program(block, &payload);
            } else {
                if self.input.len() < COMMAND_LEN {
                    return;
                }
                let command: Vec<u8> = self.input.drain(..COMMAND_LEN).collect();
                self.command(&command);
            }
        }
    }

    fn command(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw).into_owned();
        log::trace!("dummy: {}", text);
        self.history.push(text.clone());
        if self.faults.silent {
            return;
        }

        let mut echo = raw.to_vec();
        if let Some(op) = &self.faults.bad_echo {
            if text.starts_with(op.as_str()) {
                echo[COMMAND_LEN - 1] ^= 0x01;
            }
        }
        self.rx.extend(echo);

        let hex = |range: std::ops::Range<usize>| {
            text.get(range)
                .and_then(|s| u32::from_str_radix(s, 16).ok())
                .unwrap_or(0) as usize
        };

        if text == OP_READ_INFO {
            let info = self.config.info;
            self.rx.extend(info);
        } else if text == OP_DEVICE_ID {
            let id = self.config.chip_response;
            self.rx.extend(id);
        } else if text.starts_with(OP_READ_BLOCK) {
            let addr = hex(4..8);
            for i in addr..addr + BLOCK_SIZE {
                let byte = self.flash.get(i).copied().unwrap_or(0xFF);
                self.rx.push_back(byte);
            }
        } else if text.starts_with(OP_ERASE_SECTOR) {
            let start = hex(4..8) * BLOCK_SIZE;
            if !self.faults.ignore_erase {
                let end = (start + SECTOR_SIZE).min(self.flash.len());
                if start < end {
                    self.flash[start..end].fill(0xFF);
                }
            }
            self.rx.extend(self.config.erase_cycles.to_le_bytes());
        } else if text.starts_with(OP_WRITE_BLOCK) {
            self.pending_write = Some(hex(4..8) as u16);
        } else if text.starts_with(OP_READ_EEPROM) {
            let byte = self.eeprom.get(hex(4..8)).copied().unwrap_or(0xFF);
            self.rx.push_back(byte);
        } else if text.starts_with(OP_WRITE_BYTE) {
            self.pokes.push((hex(2..6) as u16, hex(6..8) as u8));
        } else {
            log::warn!("dummy: unknown command {:?}", text);
        }
    }

    fn program(&mut self, block: u16, payload: &[u8]) {
        let start = block as usize * BLOCK_SIZE;
        if !self.faults.lost_blocks.contains(&block) {
            if let Some(cells) = self.flash.get_mut(start..start + BLOCK_SIZE) {
                // Programming can only clear bits
                for (cell, &byte) in cells.iter_mut().zip(payload) {
                    *cell &= byte;
                }
            }
        }

        let mut checksum = block_checksum(payload);
        if self.faults.bad_checksum_blocks.contains(&block) {
            checksum ^= 0x01;
        }
        self.rx.push_back(checksum);
        let noise = self.faults.trailing_noise.clone();
        self.rx.extend(noise);
    }
}

/// Emulated reader board with an attached cartridge
#[derive(Debug, Clone)]
pub struct DummyBoard {
    state: Arc<Mutex<State>>,
}

impl DummyBoard {
    /// Create a board with erased flash and the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let flash = vec![0xFF; config.size];
        let eeprom = vec![0xFF; config.eeprom_size];
        Self {
            state: Arc::new(Mutex::new(State {
                config,
                faults: Faults::default(),
                flash,
                eeprom,
                pokes: Vec::new(),
                open: false,
                opened: 0,
                input: Vec::new(),
                pending_write: None,
                rx: VecDeque::new(),
                history: Vec::new(),
            })),
        }
    }

    /// Create a board with the default configuration (SST39SF010A)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a board whose flash starts with `initial_data`
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let board = Self::new(config);
        {
            let mut state = board.lock();
            let len = initial_data.len().min(state.flash.len());
            state.flash[..len].copy_from_slice(&initial_data[..len]);
        }
        board
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the injected faults
    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Copy of the flash contents
    pub fn flash(&self) -> Vec<u8> {
        self.lock().flash.clone()
    }

    /// Store bytes in the EEPROM
    pub fn set_eeprom(&self, address: usize, bytes: &[u8]) {
        let mut state = self.lock();
        if let Some(cells) = state.eeprom.get_mut(address..address + bytes.len()) {
            cells.copy_from_slice(bytes);
        }
    }

    /// Every command received so far, in order
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Received commands starting with `opcode`
    pub fn commands(&self, opcode: &str) -> Vec<String> {
        self.lock()
            .history
            .iter()
            .filter(|c| c.starts_with(opcode))
            .cloned()
            .collect()
    }

    /// `WRaaaabb` writes received so far
    pub fn pokes(&self) -> Vec<(u16, u8)> {
        self.lock().pokes.clone()
    }

    /// How many times the board has been opened
    pub fn open_count(&self) -> usize {
        self.lock().opened
    }
}

impl Transport for DummyBoard {
    fn open(&mut self) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            state.open = true;
            state.opened += 1;
            log::debug!("dummy: opened");
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        if state.open {
            state.open = false;
            state.rx.clear();
            state.input.clear();
            state.pending_write = None;
            log::debug!("dummy: closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<bool> {
        let mut state = self.lock();
        if !state.open {
            return Err(ProtocolError::PortClosed);
        }
        state.handle_input(data);
        Ok(true)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let state = self.lock();
        if !state.open {
            return Err(ProtocolError::PortClosed);
        }
        Ok(state.rx.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        if !state.open {
            return Err(ProtocolError::PortClosed);
        }
        let len = state.rx.len().min(buf.len());
        for (dst, src) in buf.iter_mut().zip(state.rx.drain(..len)) {
            *dst = src;
        }
        Ok(len)
    }
}
