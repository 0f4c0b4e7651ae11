use std::fmt::{Debug, Formatter};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use native_tls::TlsStream;

/// Must be implemented for a transport in order for a [`Client`](crate::client::Client) using
/// that transport to support timeouts and an explicit teardown.
pub trait Transport {
    /// Set the timeout for subsequent reads and writes to the given one.
    ///
    /// If `timeout` is `None`, reads and writes block indefinitely.
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Close both halves of the transport.
    fn shutdown(&mut self) -> io::Result<()>;
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

impl Transport for TlsStream<TcpStream> {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.get_mut().set_timeout(timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        // close_notify first; the socket goes down regardless
        let _ = TlsStream::shutdown(self);
        TcpStream::shutdown(self.get_mut(), Shutdown::Both)
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

/// POP3 connection trait of a read/write stream
pub trait PopConnection: Read + Write + Send + Transport + private::Sealed {}

impl<T> PopConnection for T where T: Read + Write + Send + Transport {}

impl Debug for dyn PopConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "POP3 connection")
    }
}

/// A boxed connection type, either plaintext or TLS.
pub type Connection = Box<dyn PopConnection>;

mod private {
    use super::{Read, Transport, Write};

    pub trait Sealed {}

    impl<T> Sealed for T where T: Read + Write + Transport {}
}
