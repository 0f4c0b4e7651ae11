use std::io::{Error as IoError, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use native_tls::{Protocol, TlsConnector};

use crate::client::Client;
use crate::conn::{Connection, PopConnection};
use crate::error::{Error, NegotiationError, Result};

/// Default port for plaintext and STARTTLS sessions.
pub const POP3_PORT: u16 = 110;
/// Default port for TLS-on-connect sessions.
pub const POP3S_PORT: u16 = 995;

/// Which TLS protocol versions to accept, or `None` for a plaintext session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsProtocol {
    /// No encryption at all.
    #[default]
    None,
    /// Whatever the platform TLS library allows by default.
    Default,
    /// TLS 1.0 or newer.
    Tls10,
    /// TLS 1.1 or newer.
    Tls11,
    /// TLS 1.2 or newer.
    Tls12,
}

impl TlsProtocol {
    fn min_version(self) -> Option<Protocol> {
        match self {
            TlsProtocol::None | TlsProtocol::Default => None,
            TlsProtocol::Tls10 => Some(Protocol::Tlsv10),
            TlsProtocol::Tls11 => Some(Protocol::Tlsv11),
            TlsProtocol::Tls12 => Some(Protocol::Tlsv12),
        }
    }
}

impl FromStr for TlsProtocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['.', '_', '-'], "").as_str() {
            "none" => Ok(TlsProtocol::None),
            "default" | "tls" => Ok(TlsProtocol::Default),
            "tls10" | "tls1" => Ok(TlsProtocol::Tls10),
            "tls11" => Ok(TlsProtocol::Tls11),
            "tls12" => Ok(TlsProtocol::Tls12),
            _ => Err(format!("unknown TLS protocol: {}", s)),
        }
    }
}

/// When TLS is negotiated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// The whole session, greeting included, runs inside TLS (POP3S).
    #[default]
    Connect,
    /// The session starts in plaintext and is upgraded with `STLS`.
    StartTls,
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "connect" | "pop3s" | "ssl" => Ok(TlsMode::Connect),
            "starttls" | "stls" => Ok(TlsMode::StartTls),
            _ => Err(format!("unknown TLS negotiation mode: {}", s)),
        }
    }
}

/// A convenience builder for [`Client`] structs over plaintext or encrypted transports.
///
/// The builder carries the connection part of the configuration: where to connect, whether
/// and how to negotiate TLS, and the socket timeout. A plaintext client is the default:
/// ```no_run
/// # use popfree::ClientBuilder;
/// # fn main() -> Result<(), popfree::Error> {
/// let client = ClientBuilder::new("pop.example.com", 110).connect()?;
/// # Ok(())
/// # }
/// ```
///
/// TLS from the first byte:
/// ```no_run
/// # use popfree::{ClientBuilder, TlsProtocol};
/// # fn main() -> Result<(), popfree::Error> {
/// let client = ClientBuilder::new("pop.example.com", 995)
///     .tls(TlsProtocol::Tls12)
///     .connect()?;
/// # Ok(())
/// # }
/// ```
///
/// To use `STLS`, just call `starttls()` before connecting:
/// ```no_run
/// # use popfree::ClientBuilder;
/// # fn main() -> Result<(), popfree::Error> {
/// let client = ClientBuilder::new("pop.example.com", 110)
///     .starttls()
///     .connect()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ClientBuilder {
    host: String,
    port: u16,
    tls: TlsProtocol,
    mode: TlsMode,
    timeout: Option<Duration>,
    accept_invalid_certs: bool,
}

impl ClientBuilder {
    /// Make a new `ClientBuilder` using the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientBuilder {
            host: host.into(),
            port,
            tls: TlsProtocol::None,
            mode: TlsMode::Connect,
            timeout: Some(Duration::from_secs(60)),
            accept_invalid_certs: false,
        }
    }

    /// The host this builder connects to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port this builder connects to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Select the TLS protocol versions to accept. [`TlsProtocol::None`] disables TLS.
    pub fn tls(&mut self, protocol: TlsProtocol) -> &mut Self {
        self.tls = protocol;
        self
    }

    /// Select when TLS is negotiated. Ignored for plaintext sessions.
    pub fn mode(&mut self, mode: TlsMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Use `STLS` for this connection, enabling TLS if it was not selected yet.
    pub fn starttls(&mut self) -> &mut Self {
        if self.tls == TlsProtocol::None {
            self.tls = TlsProtocol::Default;
        }
        self.mode = TlsMode::StartTls;
        self
    }

    /// Timeout applied to connecting and to every subsequent read and write.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Accept any server certificate. Only meant for testing against self-signed servers.
    pub fn danger_accept_invalid_certs(&mut self, accept: bool) -> &mut Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Connect, negotiate TLS as configured, and read the server greeting.
    pub fn connect(&self) -> Result<Client<Connection>> {
        if self.tls == TlsProtocol::None {
            let tcp = self.open_tcp()?;
            let mut client = Client::new(Box::new(tcp) as Connection);
            client.read_greeting()?;
            return Ok(client);
        }

        let mut builder = TlsConnector::builder();
        builder.min_protocol_version(self.tls.min_version());
        builder.danger_accept_invalid_certs(self.accept_invalid_certs);
        let connector = builder.build()?;
        self.connect_with(|domain, tcp| Ok(connector.connect(domain, tcp)?))
    }

    /// Make a [`Client`] using a custom TLS initialization. This function is intended
    /// to be used if your TLS setup requires custom work such as adding private CAs
    /// or client certificates.
    ///
    /// The `handshake` argument should accept two parameters:
    ///
    /// - domain: [`&str`]
    /// - tcp: [`TcpStream`]
    ///
    /// and yield a `Result<C>` where `C` is a [`PopConnection`]. It should only perform
    /// TLS initialization over the given `tcp` socket and return the encrypted stream.
    ///
    /// In [`TlsMode::StartTls`] the greeting has been read and `STLS` accepted before
    /// `handshake` is called.
    pub fn connect_with<F, C>(&self, handshake: F) -> Result<Client<Connection>>
    where
        F: FnOnce(&str, TcpStream) -> Result<C>,
        C: PopConnection + 'static,
    {
        let tcp = self.open_tcp()?;
        let mut client = match self.mode {
            TlsMode::StartTls => {
                let mut plain = Client::new(tcp);
                plain.read_greeting()?;
                let reply = plain.run_command("STLS")?;
                if !reply.is_ok() {
                    return Err(NegotiationError::Rejected(reply.raw().to_string()).into());
                }
                let timestamp = plain.take_apop_timestamp();
                let tls = handshake(&self.host, plain.into_inner()?)?;
                let mut client = Client::new(Box::new(tls) as Connection);
                client.set_apop_timestamp(timestamp);
                client
            }
            TlsMode::Connect => {
                let tls = handshake(&self.host, tcp)?;
                let mut client = Client::new(Box::new(tls) as Connection);
                client.read_greeting()?;
                client
            }
        };
        client.mark_tls();
        debug!("TLS negotiated with {}:{}", self.host, self.port);
        Ok(client)
    }

    fn open_tcp(&self) -> Result<TcpStream> {
        if self.host.trim().is_empty() {
            return Err(Error::ConnectionState("host is not set".to_string()));
        }
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            let attempt = match self.timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(tcp) => {
                    tcp.set_read_timeout(self.timeout)?;
                    tcp.set_write_timeout(self.timeout)?;
                    debug!("connected to {} ({})", self.host, addr);
                    return Ok(tcp);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(Error::Io(last_err.unwrap_or_else(|| {
            IoError::new(ErrorKind::NotFound, format!("no address found for {}", self.host))
        })))
    }
}
