//! POP3 mailbox retrieval and MIME message decoding for Rust.
//!
//! The crate has two halves. The protocol half connects to a POP3 server, optionally over TLS
//! or through `STLS`, authenticates with `USER`/`PASS` or `APOP`, and retrieves messages by
//! unique id. The MIME half decodes a retrieved message into its headers, body, alternate
//! views and attachments.
//!
//! On top of both, [`sync::MailboxSync`] drains a maildrop into a directory queue, and
//! [`supervisor::MailSupervisor`] runs that drain while a thread pool extracts every queued
//! message to disk.
//!
//! # Usage
//!
//! Here is a basic example of using the client.
//! See the `demos/` directory for a complete command-line retriever.
//!
//! ```no_run
//! use popfree::mime::MimeParser;
//! use popfree::{ClientBuilder, Credentials, TlsProtocol};
//!
//! fn main() -> popfree::Result<()> {
//!     let mut client = ClientBuilder::new("pop.example.com", popfree::POP3S_PORT)
//!         .tls(TlsProtocol::Tls12)
//!         .connect()?;
//!
//!     client.authenticate(&Credentials::new("username", "password"))?;
//!
//!     let stat = client.stat()?;
//!     println!("{} message(s), {} octets", stat.count, stat.size);
//!
//!     let parser = MimeParser::new();
//!     for uid in client.list_uids()? {
//!         let message = client.message(uid.number, &parser)?;
//!         println!("{}: {}", uid.id, message.subject().unwrap_or("(no subject)"));
//!     }
//!
//!     client.quit()
//! }
//! ```

mod parse;
pub mod types;

pub mod authenticator;
pub mod client;
mod client_builder;
mod conn;
pub mod error;
pub mod mailbox;
pub mod mime;
pub mod supervisor;
pub mod sync;
mod utils;
pub mod worker;

pub use crate::authenticator::{AuthMethod, Credentials};
pub use crate::client::{Client, MessageReader};
pub use crate::client_builder::{ClientBuilder, TlsMode, TlsProtocol, POP3S_PORT, POP3_PORT};
pub use crate::conn::{Connection, PopConnection, Transport};
pub use crate::error::{Error, Result};
pub use crate::types::*;

#[cfg(feature = "test_helpers")]
pub mod testing;

#[cfg(test)]
mod mock_stream;
