//! Credentials and the authentication mechanisms of RFC 1939.

use std::fmt;
use std::str::FromStr;

use openssl::hash::{hash, MessageDigest};

use crate::error::Result;

/// How to prove our identity to the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthMethod {
    /// `USER` followed by `PASS`, sending the password in the clear.
    UserPass,
    /// `APOP`, sending an MD5 digest of the greeting timestamp and the password.
    Apop,
    /// `APOP` when the greeting carried a timestamp, `USER`/`PASS` otherwise.
    #[default]
    Auto,
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "userpass" | "user" | "plain" => Ok(AuthMethod::UserPass),
            "apop" => Ok(AuthMethod::Apop),
            "auto" => Ok(AuthMethod::Auto),
            other => Err(format!("unknown authentication method: {}", other)),
        }
    }
}

/// A username and password together with the mechanism used to present them.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Mailbox user name.
    pub username: String,
    /// Mailbox password.
    pub password: String,
    /// Mechanism used by [`Client::authenticate`](crate::client::Client::authenticate).
    pub method: AuthMethod,
}

impl Credentials {
    /// Credentials using [`AuthMethod::Auto`].
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
            method: AuthMethod::Auto,
        }
    }

    /// Use the given mechanism instead.
    pub fn method(mut self, method: AuthMethod) -> Credentials {
        self.method = method;
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("method", &self.method)
            .finish()
    }
}

/// The `APOP` digest: lowercase hex MD5 of the greeting timestamp immediately followed by the
/// shared secret.
pub fn apop_digest(timestamp: &str, password: &str) -> Result<String> {
    let mut input = Vec::with_capacity(timestamp.len() + password.len());
    input.extend_from_slice(timestamp.as_bytes());
    input.extend_from_slice(password.as_bytes());
    let digest = hash(MessageDigest::md5(), &input)?;
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Servers report a mailbox held by another session with wording such as `-ERR [IN-USE] unable
/// to lock maildrop`.
pub(crate) fn is_lock_message(raw: &str) -> bool {
    raw.to_ascii_lowercase().contains("lock")
}
