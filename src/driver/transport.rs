//! Transport and connector seams.
//!
//! A session talks to any blocking byte stream that implements [`Transport`];
//! a pool creates new ones through a [`Connector`]. TCP is the production
//! implementation, the recorder wraps either for tests.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use super::config::ServerAddress;

/// Blocking byte stream a session runs over.
pub trait Transport: Read + Write + Send {
    /// Apply a deadline to every subsequent read and write. `None` blocks forever.
    fn set_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    /// Close both directions.
    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        (**self).set_timeout(timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown()
    }
}

/// Source of fresh transports.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Open a new transport. The handshake is not part of this.
    fn connect(&self) -> io::Result<Self::Transport>;
}

impl<F, T> Connector for F
where
    F: Fn() -> io::Result<T> + Send + Sync,
    T: Transport,
{
    type Transport = T;

    fn connect(&self) -> io::Result<T> {
        self()
    }
}

/// Connects over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: ServerAddress,
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(address: ServerAddress) -> Self {
        Self {
            address,
            connect_timeout: None,
        }
    }

    /// Bound the time spent establishing each connection.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }
}

impl Connector for TcpConnector {
    type Transport = TcpStream;

    fn connect(&self) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            None => TcpStream::connect(self.address.to_socket_addr())?,
            Some(timeout) => {
                let mut last_err = None;
                let mut connected = None;
                for addr in self.address.to_socket_addr().to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                match connected {
                    Some(stream) => stream,
                    None => {
                        return Err(last_err.unwrap_or_else(|| {
                            io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
                        }))
                    }
                }
            }
        };

        // Enable TCP nodelay for lower latency
        stream.set_nodelay(true).ok();
        debug!(address = %self.address, "TCP connection established");
        Ok(stream)
    }
}
