//! This module contains types used throughout the POP3 protocol.

use std::fmt;

mod capabilities;
pub use self::capabilities::Capabilities;

mod response;
pub use self::response::Response;

/// From [section 5 of RFC 1939](https://tools.ietf.org/html/rfc1939#section-5).
///
/// Each message in the maildrop is assigned a message-number, starting at 1. Message numbers
/// are only meaningful for the lifetime of one session: a later session may hand the same
/// number to a different message, so they must never be persisted.
pub type MessageNumber = u32;

/// From [section 7 of RFC 1939](https://tools.ietf.org/html/rfc1939#section-7).
///
/// The unique-id of a message is an arbitrary server-determined string, consisting of one to 70
/// characters in the range 0x21 to 0x7E, which uniquely identifies a message within a maildrop
/// and which persists across sessions. This persistence is required even if a session ends
/// without entering the UPDATE state. The server should never reuse an unique-id in a given
/// maildrop, for as long as the entity using the unique-id exists.
///
/// While it is generally preferable for server implementations to store arbitrarily assigned
/// unique-ids in the maildrop, this specification is intended to permit unique-ids to be
/// calculated as a hash of the message. Clients should be able to handle a situation where two
/// identical copies of a message in a maildrop have the same unique-id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageUid {
    /// The session-scoped message number.
    pub number: MessageNumber,
    /// The persistent unique identifier.
    pub id: String,
}

impl fmt::Display for MessageUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.number, self.id)
    }
}

/// The drop listing returned by `STAT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stat {
    /// Number of messages in the maildrop.
    pub count: u32,
    /// Size of the maildrop in octets.
    pub size: u64,
}

/// One entry of the scan listing returned by `LIST`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageSize {
    /// The session-scoped message number.
    pub number: MessageNumber,
    /// Exact size of the message in octets.
    pub size: u64,
}

/// Where a [`Client`](crate::client::Client) is in the lifecycle of its session.
///
/// There is no disconnected state: a client only exists once a transport has been
/// established, see [`ClientBuilder::connect`](crate::ClientBuilder::connect).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// A plaintext session has been established.
    Connected,
    /// The session runs inside TLS, either from the start or after `STLS`.
    TlsNegotiated,
    /// The server accepted our credentials; the session is in the TRANSACTION state.
    Authenticated,
    /// `QUIT` was sent or the transport was torn down.
    Closed,
}

impl ConnectionState {
    /// Whether commands may still be sent in this state.
    pub fn is_open(self) -> bool {
        self != ConnectionState::Closed
    }
}
