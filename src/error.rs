//! POP3 and MIME error types.

use std::io::{Error as IoError, ErrorKind};
use std::net::TcpStream;
use std::result;

use bufstream::IntoInnerError as BufError;
use native_tls::Error as TlsError;
use native_tls::HandshakeError as TlsHandshakeError;
use openssl::error::ErrorStack;
use thiserror::Error;

/// A convenience wrapper around `Result` for `popfree::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur while talking to a POP3 server or decoding a message.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream or a file.
    #[error(transparent)]
    Io(#[from] IoError),
    /// The client was used in a state that does not allow the operation.
    #[error("invalid connection state: {0}")]
    ConnectionState(String),
    /// Setting up TLS, either on connect or through `STLS`, failed.
    #[error("protocol negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),
    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The server rejected the credentials because another session holds the mailbox lock.
    #[error("mailbox is locked: {0}")]
    MailboxLocked(String),
    /// A command returned a failure status.
    #[error("server error: {0}")]
    ServerResponse(String),
    /// The connection was terminated unexpectedly.
    #[error("connection lost")]
    ConnectionLost,
    /// Error parsing a server response.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Error validating input data.
    #[error(transparent)]
    Validate(#[from] ValidateError),
    /// The server lacks a capability the caller depends on.
    #[error("server not supported: {0}")]
    Unsupported(String),
    /// The sync engine gave up after too many consecutive failed passes.
    #[error("maximum retries exceeded after {failures} failures")]
    RetriesExceeded {
        /// Number of consecutive failed passes.
        failures: u32,
        /// The failure that ended the final pass.
        #[source]
        source: Box<Error>,
    },
    /// A message could not be decoded.
    #[error(transparent)]
    Mime(#[from] MimeError),
    /// Computing the APOP digest failed.
    #[error("digest error: {0}")]
    Digest(#[from] ErrorStack),
}

impl<T> From<BufError<T>> for Error {
    fn from(err: BufError<T>) -> Error {
        Error::Io(err.into())
    }
}

impl From<TlsHandshakeError<TcpStream>> for Error {
    fn from(err: TlsHandshakeError<TcpStream>) -> Error {
        Error::Negotiation(NegotiationError::Handshake(err))
    }
}

impl From<TlsError> for Error {
    fn from(err: TlsError) -> Error {
        Error::Negotiation(NegotiationError::Tls(err))
    }
}

impl From<Error> for IoError {
    fn from(err: Error) -> IoError {
        match err {
            Error::Io(e) => e,
            Error::ConnectionLost => IoError::new(ErrorKind::UnexpectedEof, "connection lost"),
            e => IoError::new(ErrorKind::Other, e.to_string()),
        }
    }
}

impl Error {
    /// Whether this error was caused by a socket read or write timing out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Io(e) => matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock),
            Error::RetriesExceeded { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Whether a fresh session has a reasonable chance of succeeding where this one failed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::ConnectionLost
                | Error::Parse(_)
                | Error::ServerResponse(_)
                | Error::MailboxLocked(_)
        )
    }
}

/// Failures while establishing an encrypted session.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// An error from the `native_tls` library while configuring the connector.
    #[error(transparent)]
    Tls(TlsError),
    /// An error from the `native_tls` library during the TLS handshake.
    #[error(transparent)]
    Handshake(TlsHandshakeError<TcpStream>),
    /// The server refused to switch to TLS.
    #[error("STLS rejected: {0}")]
    Rejected(String),
}

/// Responses the client could not make sense of.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A status line that did not carry the expected values.
    #[error("unable to parse response: {0}")]
    Response(String),
    /// A line of a multi-line listing that does not have the expected shape.
    #[error("unable to parse listing line: {0}")]
    Listing(String),
}

/// Invalid character found in a command argument.
#[derive(Debug, Error)]
#[error("invalid character in input: {0:?}")]
pub struct ValidateError(pub char);

/// Failures decoding a MIME message.
#[derive(Debug, Error)]
pub enum MimeError {
    /// The stream did not start with a header block.
    #[error("message has no header block")]
    MissingHeaders,
    /// Multipart bodies were nested deeper than the parser allows.
    #[error("multipart nesting exceeds {limit} levels")]
    NestingTooDeep {
        /// The configured maximum depth.
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_classification() {
        let e = Error::Io(IoError::new(ErrorKind::TimedOut, "slow"));
        assert!(e.is_timeout());
        assert!(e.is_transient());

        let e = Error::Io(IoError::new(ErrorKind::WouldBlock, "slow"));
        assert!(e.is_timeout());

        let e = Error::Io(IoError::new(ErrorKind::ConnectionReset, "reset"));
        assert!(!e.is_timeout());
        assert!(e.is_transient());
    }

    #[test]
    fn fatal_errors_are_not_transient() {
        assert!(!Error::Authentication("-ERR bad".into()).is_transient());
        assert!(!Error::Unsupported("UIDL".into()).is_transient());
        assert!(!Error::ConnectionState("not connected".into()).is_transient());
        assert!(!Error::Mime(MimeError::MissingHeaders).is_transient());
        assert!(Error::MailboxLocked("-ERR lock".into()).is_transient());
        assert!(Error::ServerResponse("-ERR".into()).is_transient());
    }

    #[test]
    fn into_io_error() {
        let io: IoError = Error::ConnectionLost.into();
        assert_eq!(io.kind(), ErrorKind::UnexpectedEof);

        let io: IoError = Error::Io(IoError::new(ErrorKind::TimedOut, "t")).into();
        assert_eq!(io.kind(), ErrorKind::TimedOut);
    }
}
