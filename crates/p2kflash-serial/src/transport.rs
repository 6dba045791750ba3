//! Transport layer abstraction for the reader board
//!
//! A transport is a byte pipe with ordered delivery but no timing
//! guarantees. The command channel polls [`Transport::bytes_available`]
//! and only reads bytes that have already arrived.

use std::time::Duration;

use crate::error::Result;

/// Byte-stream connection to the reader board
pub trait Transport: Send {
    /// Open the connection
    fn open(&mut self) -> Result<()>;

    /// Close the connection. Closing a closed transport is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Whether the connection is open
    fn is_open(&self) -> bool;

    /// Write all of `data`, waiting at most `timeout` for it to be flushed
    ///
    /// Returns `false` if the timeout elapsed first.
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<bool>;

    /// Number of received bytes that can be read without blocking
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` already received bytes, returning the count
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<bool> {
        (**self).write(data, timeout)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<bool> {
        (**self).write(data, timeout)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

#[cfg(feature = "serial")]
pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use crate::error::ProtocolError;
    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};

    /// Default baud rate of the 32u4 reader firmware
    pub const DEFAULT_BAUD: u32 = 115200;

    /// Serial port transport
    pub struct SerialTransport {
        device: String,
        baud: u32,
        port: Option<Box<dyn SerialPort>>,
    }

    impl SerialTransport {
        /// Describe a serial port; nothing is opened until [`Transport::open`]
        pub fn new(device: &str, baud: Option<u32>) -> Self {
            Self {
                device: device.to_string(),
                baud: baud.unwrap_or(DEFAULT_BAUD),
                port: None,
            }
        }

        /// Device path
        pub fn device(&self) -> &str {
            &self.device
        }

        fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
            self.port.as_mut().ok_or(ProtocolError::PortClosed)
        }
    }

    impl Transport for SerialTransport {
        fn open(&mut self) -> Result<()> {
            if self.port.is_some() {
                return Ok(());
            }

            let port = serialport::new(&self.device, self.baud)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(Duration::from_secs(1))
                .open()?;

            log::info!("Opened serial port {} at {} baud", self.device, self.baud);
            self.port = Some(port);
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            if self.port.take().is_some() {
                log::info!("Closed serial port {}", self.device);
            }
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.port.is_some()
        }

        fn write(&mut self, data: &[u8], timeout: Duration) -> Result<bool> {
            let port = self.port()?;
            let old_timeout = port.timeout();
            port.set_timeout(timeout)?;

            let result = match port.write_all(data).and_then(|_| port.flush()) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(false),
                Err(e) => Err(ProtocolError::from(e)),
            };

            port.set_timeout(old_timeout)?;
            result
        }

        fn bytes_available(&mut self) -> Result<usize> {
            Ok(self.port()?.bytes_to_read()? as usize)
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let available = self.bytes_available()?;
            let len = available.min(buf.len());
            if len == 0 {
                return Ok(0);
            }
            self.port()?.read_exact(&mut buf[..len])?;
            Ok(len)
        }
    }
}

pub mod tcp {
    //! TCP socket transport, for boards bridged over the network and for
    //! emulators

    use super::*;
    use crate::error::ProtocolError;
    use std::collections::VecDeque;
    use std::io::{ErrorKind, Read, Write};
    use std::net::TcpStream;

    /// TCP socket transport
    pub struct TcpTransport {
        host: String,
        port: u16,
        stream: Option<TcpStream>,
        pending: VecDeque<u8>,
    }

    impl TcpTransport {
        /// Describe a TCP endpoint; nothing is connected until [`Transport::open`]
        pub fn new(host: &str, port: u16) -> Self {
            Self {
                host: host.to_string(),
                port,
                stream: None,
                pending: VecDeque::new(),
            }
        }

        fn stream(&mut self) -> Result<&mut TcpStream> {
            self.stream.as_mut().ok_or(ProtocolError::PortClosed)
        }

        /// Move everything the socket has received into `pending`
        fn fill(&mut self) -> Result<()> {
            let mut buf = [0u8; 512];
            let stream = self.stream.as_mut().ok_or(ProtocolError::PortClosed)?;
            stream.set_nonblocking(true)?;
            let result = loop {
                match stream.read(&mut buf) {
                    // Hand out what arrived before the peer hung up first
                    Ok(0) if !self.pending.is_empty() => break Ok(()),
                    Ok(0) => {
                        break Err(ProtocolError::ConnectionFailed(
                            "connection closed by peer".into(),
                        ))
                    }
                    Ok(n) => self.pending.extend(&buf[..n]),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                    Err(e) => break Err(ProtocolError::from(e)),
                }
            };
            stream.set_nonblocking(false)?;
            result
        }
    }

    impl Transport for TcpTransport {
        fn open(&mut self) -> Result<()> {
            if self.stream.is_some() {
                return Ok(());
            }

            let addr = format!("{}:{}", self.host, self.port);
            log::info!("Connecting to reader board at {}", addr);

            let stream = TcpStream::connect(&addr)
                .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))?;
            stream.set_nodelay(true).map_err(|e| {
                ProtocolError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
            })?;

            log::info!("Connected to reader board at {}", addr);
            self.stream = Some(stream);
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            if self.stream.take().is_some() {
                log::info!("Disconnected from {}:{}", self.host, self.port);
            }
            self.pending.clear();
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.stream.is_some()
        }

        fn write(&mut self, data: &[u8], timeout: Duration) -> Result<bool> {
            let stream = self.stream()?;
            stream.set_write_timeout(Some(timeout))?;
            match stream.write_all(data).and_then(|_| stream.flush()) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::TimedOut => Ok(false),
                Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
                Err(e) => Err(ProtocolError::from(e)),
            }
        }

        fn bytes_available(&mut self) -> Result<usize> {
            self.fill()?;
            Ok(self.pending.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let len = self.pending.len().min(buf.len());
            for (dst, src) in buf.iter_mut().zip(self.pending.drain(..len)) {
                *dst = src;
            }
            Ok(len)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::net::TcpListener;
        use std::thread;
        use std::time::Instant;

        #[test]
        fn test_reply_survives_peer_close() {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            let bridge = thread::spawn(move || {
                let (mut socket, _) = listener.accept().unwrap();
                socket.write_all(b"READINFO").unwrap();
            });

            let mut transport = TcpTransport::new("127.0.0.1", port);
            transport.open().unwrap();
            bridge.join().unwrap();

            let deadline = Instant::now() + Duration::from_secs(5);
            while transport.bytes_available().unwrap() < 8 {
                assert!(Instant::now() < deadline, "reply never arrived");
                thread::sleep(Duration::from_millis(5));
            }
            let mut buf = [0u8; 8];
            assert_eq!(transport.read(&mut buf).unwrap(), 8);
            assert_eq!(&buf, b"READINFO");

            let closed = loop {
                match transport.bytes_available() {
                    Ok(0) => {
                        assert!(Instant::now() < deadline, "close never seen");
                        thread::sleep(Duration::from_millis(5));
                    }
                    other => break other,
                }
            };
            assert!(matches!(closed, Err(ProtocolError::ConnectionFailed(_))));
        }
    }
}
