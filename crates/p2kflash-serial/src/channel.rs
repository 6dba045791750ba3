//! Command channel: framing of 8-byte commands and their echoed responses
//!
//! One command is in flight at a time. Every exchange writes the command,
//! waits until the echo (and any payload) has arrived, checks the echo and
//! hands back the payload. Nothing here retries; the only loop is the
//! bounded stall detection in [`CommandChannel::await_bytes`].

use std::time::Duration;

use crate::command::Command;
use crate::delay::{Delay, ThreadDelay};
use crate::error::{ProtocolError, Result};
use crate::protocol::ECHO_LEN;
use crate::transport::Transport;

/// Timing parameters of the command channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Wait between two polls of the receive buffer
    pub poll_interval: Duration,
    /// Polls without new bytes before a response is given up
    pub max_stalls: u32,
    /// Bound on writing one command
    pub send_timeout: Duration,
    /// Bound on writing one 256-byte data block
    pub block_timeout: Duration,
    /// How long trailing bytes are awaited before they are discarded
    pub flush_window: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            max_stalls: 100,
            send_timeout: Duration::from_millis(1000),
            block_timeout: Duration::from_millis(5000),
            flush_window: Duration::from_millis(50),
        }
    }
}

/// Framed command/response exchanges over a [`Transport`]
pub struct CommandChannel<T, D = ThreadDelay> {
    transport: T,
    delay: D,
    config: ChannelConfig,
}

impl<T: Transport> CommandChannel<T> {
    /// Create a channel that sleeps the current thread while polling
    pub fn new(transport: T, config: ChannelConfig) -> Self {
        Self::with_delay(transport, ThreadDelay, config)
    }
}

impl<T: Transport, D: Delay> CommandChannel<T, D> {
    /// Create a channel with an explicit delay implementation
    pub fn with_delay(transport: T, delay: D, config: ChannelConfig) -> Self {
        Self {
            transport,
            delay,
            config,
        }
    }

    /// Timing parameters in use
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send a command and check its echo
    pub fn send(&mut self, command: &Command) -> Result<()> {
        self.write_command(command)?;
        self.await_bytes(command, ECHO_LEN)?;
        self.check_echo(command)
    }

    /// Send a command and return the `payload_len` bytes following its echo
    ///
    /// On an echo mismatch the payload is left unread.
    pub fn send_and_capture(&mut self, command: &Command, payload_len: usize) -> Result<Vec<u8>> {
        self.write_command(command)?;
        self.await_bytes(command, ECHO_LEN + payload_len)?;
        self.check_echo(command)?;
        let payload = self.read_exact(command, payload_len)?;
        log::trace!("{}: {} payload byte(s)", command, payload.len());
        Ok(payload)
    }

    /// Write raw data (a block payload) with the block write timeout
    pub fn send_raw(&mut self, command: &Command, data: &[u8]) -> Result<()> {
        if !self.transport.write(data, self.config.block_timeout)? {
            return Err(ProtocolError::SendTimeout {
                command: format!("{} data ({} bytes)", command, data.len()),
            });
        }
        Ok(())
    }

    /// Wait for and read `len` bytes that are not preceded by an echo
    pub fn capture(&mut self, command: &Command, len: usize) -> Result<Vec<u8>> {
        self.await_bytes(command, len)?;
        self.read_exact(command, len)
    }

    /// Poll until at least `expected` bytes are buffered
    ///
    /// Every poll that finds no more bytes than the previous one counts as
    /// a stall. Stalls accumulate over the whole wait; once they exceed
    /// `max_stalls` the wait fails with [`ProtocolError::ResponseTimeout`].
    pub fn await_bytes(&mut self, command: &Command, expected: usize) -> Result<()> {
        let mut stalls = 0u32;
        let mut last = 0usize;

        loop {
            let available = self.transport.bytes_available()?;
            if available >= expected {
                return Ok(());
            }

            if available == last {
                stalls += 1;
            }
            last = available;

            if stalls > self.config.max_stalls {
                log::debug!(
                    "{}: gave up after {} stalled polls with {} of {} byte(s)",
                    command,
                    stalls,
                    available,
                    expected
                );
                return Err(ProtocolError::ResponseTimeout {
                    command: command.to_string(),
                    expected,
                    received: available,
                });
            }

            self.delay.delay(self.config.poll_interval);
        }
    }

    /// Discard anything the board sent after the last exchange
    ///
    /// Waits one flush window, then drains the receive buffer. Errors are
    /// logged and swallowed. Returns the number of discarded bytes.
    pub fn flush_residual(&mut self) -> usize {
        self.delay.delay(self.config.flush_window);

        let mut discarded = 0usize;
        let mut buf = [0u8; 64];
        loop {
            match self.transport.bytes_available() {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    log::debug!("flush: {}", e);
                    break;
                }
            }
            match self.transport.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => discarded += n,
                Err(e) => {
                    log::debug!("flush: {}", e);
                    break;
                }
            }
        }

        if discarded > 0 {
            log::warn!("Discarded {} residual byte(s)", discarded);
        }
        discarded
    }

    fn write_command(&mut self, command: &Command) -> Result<()> {
        log::debug!("Send command: {}", command);
        if !self
            .transport
            .write(command.as_bytes(), self.config.send_timeout)?
        {
            return Err(ProtocolError::SendTimeout {
                command: command.to_string(),
            });
        }
        Ok(())
    }

    fn check_echo(&mut self, command: &Command) -> Result<()> {
        let echo = self.read_exact(command, ECHO_LEN)?;
        if echo != command.as_bytes() {
            return Err(ProtocolError::EchoMismatch {
                sent: command.to_string(),
                received: String::from_utf8_lossy(&echo).into_owned(),
            });
        }
        Ok(())
    }

    fn read_exact(&mut self, command: &Command, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.transport.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(ProtocolError::ResponseTimeout {
                    command: command.to_string(),
                    expected: len,
                    received: filled,
                });
            }
            filled += n;
        }
        Ok(buf)
    }
}
