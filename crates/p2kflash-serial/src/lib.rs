//! p2kflash-serial - command protocol of the P2000T cartridge reader board
//!
//! This crate talks to the 32u4-based reader board that sits between the
//! host and an SST39SF0x0 flash cartridge.
//!
//! # Protocol Overview
//!
//! Every command is exactly 8 ASCII bytes, for example `RDBK0100` to read
//! the second block. The board answers with a verbatim echo of the command
//! followed by a fixed number of payload bytes. Programming a block sends
//! `WRBKaaaa`, waits for its echo, streams 256 data bytes and reads back a
//! one-byte sum checksum.
//!
//! # Layers
//!
//! - [`Transport`]: byte pipe with `bytes_available` polling (serial port
//!   or TCP socket)
//! - [`CommandChannel`]: framing, echo checks and bounded stall detection
//! - [`Cartridge`]: chip identification, sector erase, block program and
//!   block read
//!
//! # Example
//!
//! ```no_run
//! use p2kflash_serial::{Cartridge, ChannelConfig, Connection, Transport};
//!
//! let mut transport = Connection::parse("dev=/dev/ttyACM0")?.transport()?;
//! transport.open()?;
//! let mut cart = Cartridge::new(transport, ChannelConfig::default());
//! let chip = cart.identify_chip()?;
//! println!("{}", chip);
//! let block = cart.read_block(0)?;
//! println!("{:02X?}", &block[..16]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod channel;
pub mod command;
pub mod delay;
pub mod device;
pub mod error;
pub mod protocol;
pub mod transport;

pub use channel::{ChannelConfig, CommandChannel};
pub use command::Command;
pub use delay::{Delay, NoDelay, ThreadDelay};
pub use device::Cartridge;
pub use error::{ProtocolError, Result};
pub use protocol::BoardInfo;
#[cfg(feature = "serial")]
pub use transport::serial::SerialTransport;
pub use transport::tcp::TcpTransport;
pub use transport::Transport;

/// Where the reader board is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// USB CDC serial port
    Serial {
        /// e.g. `/dev/ttyACM0` or `COM3`
        device: String,
        /// Defaults to 115200
        baud: Option<u32>,
    },
    /// Network bridge or emulator
    Tcp {
        host: String,
        port: u16,
    },
}

impl Connection {
    /// Parse `dev=<path>[:baud]` or `ip=<host>:<port>`
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let (kind, target) = s
            .split_once('=')
            .ok_or_else(|| format!("expected dev=<path> or ip=<host>:<port>, got '{}'", s))?;

        match kind {
            "dev" => match target.rsplit_once(':') {
                Some((device, baud)) => Ok(Connection::Serial {
                    device: device.into(),
                    baud: Some(
                        baud.parse()
                            .map_err(|_| format!("bad baud rate '{}'", baud))?,
                    ),
                }),
                None => Ok(Connection::Serial {
                    device: target.into(),
                    baud: None,
                }),
            },
            "ip" => {
                let (host, port) = target
                    .rsplit_once(':')
                    .ok_or_else(|| format!("'{}' has no port", target))?;
                Ok(Connection::Tcp {
                    host: host.into(),
                    port: port
                        .parse()
                        .map_err(|_| format!("bad TCP port '{}'", port))?,
                })
            }
            other => Err(format!("unknown connection type '{}'", other)),
        }
    }

    /// Build the (still closed) transport for this connection
    pub fn transport(&self) -> Result<Box<dyn Transport>> {
        match self {
            #[cfg(feature = "serial")]
            Connection::Serial { device, baud } => {
                Ok(Box::new(SerialTransport::new(device, *baud)))
            }
            #[cfg(not(feature = "serial"))]
            Connection::Serial { device, .. } => Err(ProtocolError::ConnectionFailed(format!(
                "{}: serial support not compiled in",
                device
            ))),
            Connection::Tcp { host, port } => Ok(Box::new(TcpTransport::new(host, *port))),
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::Serial { device, baud: None } => write!(f, "dev={}", device),
            Connection::Serial {
                device,
                baud: Some(baud),
            } => write!(f, "dev={}:{}", device, baud),
            Connection::Tcp { host, port } => write!(f, "ip={}:{}", host, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial() {
        assert_eq!(
            Connection::parse("dev=/dev/ttyACM0").unwrap(),
            Connection::Serial {
                device: "/dev/ttyACM0".into(),
                baud: None
            }
        );
        assert_eq!(
            Connection::parse("dev=/dev/ttyACM0:115200").unwrap(),
            Connection::Serial {
                device: "/dev/ttyACM0".into(),
                baud: Some(115200)
            }
        );
        assert!(Connection::parse("dev=/dev/ttyACM0:fast").is_err());
    }

    #[test]
    fn test_parse_tcp() {
        let conn = Connection::parse("ip=localhost:2000").unwrap();
        assert_eq!(
            conn,
            Connection::Tcp {
                host: "localhost".into(),
                port: 2000
            }
        );
        assert_eq!(conn.to_string(), "ip=localhost:2000");
        assert!(Connection::parse("ip=localhost").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        assert!(Connection::parse("/dev/ttyACM0").is_err());
    }

    #[test]
    fn test_transport_starts_closed() {
        let transport = Connection::parse("ip=127.0.0.1:1").unwrap().transport().unwrap();
        assert!(!transport.is_open());
    }
}
