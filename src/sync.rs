//! Draining a maildrop into the local queue.
//!
//! [`MailboxSync`] repeatedly opens a session, lists the maildrop by unique id, stores every
//! message it has not seen before and deletes it from the server. Each message is written to a
//! temporary file and renamed into the queue before `DELE` is sent, so a crash can duplicate a
//! message but never lose one. Already-stored messages are recognised by their file name, which
//! makes a retried pass safe.

use std::cmp::min;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::authenticator::Credentials;
use crate::client::Client;
use crate::client_builder::ClientBuilder;
use crate::conn::{Connection, Transport};
use crate::error::{Error, Result};
use crate::mailbox::MailboxPaths;
use crate::types::MessageUid;

/// Opens authenticated-ready sessions for [`MailboxSync`].
pub trait Connector {
    /// The transport of the sessions this connector opens.
    type Stream: Read + Write + Transport;

    /// Open a session with the given socket timeout and read its greeting.
    fn open(&self, timeout: Duration) -> Result<Client<Self::Stream>>;
}

impl Connector for ClientBuilder {
    type Stream = Connection;

    fn open(&self, timeout: Duration) -> Result<Client<Connection>> {
        let mut builder = self.clone();
        builder.timeout(timeout);
        builder.connect()
    }
}

impl<C: Connector + ?Sized> Connector for &C {
    type Stream = C::Stream;

    fn open(&self, timeout: Duration) -> Result<Client<C::Stream>> {
        (**self).open(timeout)
    }
}

/// Notifications about the progress of a sync. Every method does nothing by default.
pub trait SyncEvents {
    /// `STAT` reported `count` messages.
    fn message_count(&self, _count: u32) {}
    /// A new message is about to be retrieved.
    fn message_requested(&self, _uid: &MessageUid) {}
    /// A message was stored in the queue at `path`.
    fn message_received(&self, _path: &Path) {}
    /// A message was found on disk already and is only deleted from the server.
    fn previously_downloaded(&self, _uid: &MessageUid) {}
    /// A pass failed and will be retried.
    fn server_error(&self, _error: &Error) {}
}

impl SyncEvents for () {}

impl<T: SyncEvents + ?Sized> SyncEvents for &T {
    fn message_count(&self, count: u32) {
        (**self).message_count(count)
    }

    fn message_requested(&self, uid: &MessageUid) {
        (**self).message_requested(uid)
    }

    fn message_received(&self, path: &Path) {
        (**self).message_received(path)
    }

    fn previously_downloaded(&self, uid: &MessageUid) {
        (**self).previously_downloaded(uid)
    }

    fn server_error(&self, error: &Error) {
        (**self).server_error(error)
    }
}

/// Retry and timeout policy of a [`MailboxSync`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Socket timeout of the first session.
    pub timeout: Duration,
    /// Smallest timeout used after a session timed out.
    pub min_timeout: Duration,
    /// Largest timeout the growth on repeated timeouts may reach.
    pub max_timeout: Duration,
    /// Pause between a failed pass and the next attempt.
    pub retry_delay: Duration,
    /// Consecutive failed passes after which the sync gives up.
    pub max_failures: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            timeout: Duration::from_secs(60),
            min_timeout: Duration::from_secs(60),
            max_timeout: Duration::from_secs(480),
            retry_delay: Duration::from_secs(30),
            max_failures: 10,
        }
    }
}

/// The socket timeout to use after a session timed out with `timeout`.
///
/// Doubles the timeout, but never goes below `min_timeout` or above `max_timeout`.
pub fn grow_timeout(timeout: Duration, min_timeout: Duration, max_timeout: Duration) -> Duration {
    if timeout < min_timeout {
        min_timeout
    } else {
        min(timeout.saturating_mul(2), max_timeout)
    }
}

/// Drains one maildrop into [`MailboxPaths::queue`].
pub struct MailboxSync<C, E> {
    connector: C,
    credentials: Credentials,
    paths: MailboxPaths,
    options: SyncOptions,
    events: E,
}

impl<C: Connector, E: SyncEvents> MailboxSync<C, E> {
    pub fn new(connector: C, credentials: Credentials, paths: MailboxPaths, events: E) -> Self {
        MailboxSync {
            connector,
            credentials,
            paths,
            options: SyncOptions::default(),
            events,
        }
    }

    /// Replace the retry and timeout policy.
    pub fn options(&mut self, options: SyncOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn paths(&self) -> &MailboxPaths {
        &self.paths
    }

    /// Retrieve every new message and return how many were stored.
    ///
    /// Passes are repeated until one finds nothing new, so messages arriving during the drain
    /// are picked up too. A pass failing with a transient error is retried from scratch after
    /// [`SyncOptions::retry_delay`]; after [`SyncOptions::max_failures`] consecutive failures
    /// the sync ends with [`Error::RetriesExceeded`]. Any other error ends it at once.
    pub fn download_messages(&mut self) -> Result<u32> {
        let mut total = 0;
        let mut failures = 0;
        let mut timeout = self.options.timeout;
        loop {
            let mut received = 0;
            let result = self.fetch_pass(timeout, &mut received, &mut failures);
            total += received;
            let error = match result {
                Ok(()) if received == 0 => {
                    info!("mailbox drained, {} new message(s)", total);
                    return Ok(total);
                }
                Ok(()) => {
                    debug!("pass stored {} message(s), checking again", received);
                    continue;
                }
                Err(e) => e,
            };

            self.discard_temp_file();
            if !error.is_transient() {
                return Err(error);
            }
            failures += 1;
            warn!("pass failed ({} of {}): {}", failures, self.options.max_failures, error);
            self.events.server_error(&error);
            if failures >= self.options.max_failures {
                return Err(Error::RetriesExceeded {
                    failures,
                    source: Box::new(error),
                });
            }
            if error.is_timeout() {
                timeout = grow_timeout(timeout, self.options.min_timeout, self.options.max_timeout);
                info!("timeout raised to {:?}", timeout);
            }
            thread::sleep(self.options.retry_delay);
        }
    }

    fn fetch_pass(&self, timeout: Duration, received: &mut u32, failures: &mut u32) -> Result<()> {
        let mut client = self.connector.open(timeout)?;
        let result = self.drain(&mut client, received, failures);
        client.disconnect();
        result
    }

    fn drain(
        &self,
        client: &mut Client<C::Stream>,
        received: &mut u32,
        failures: &mut u32,
    ) -> Result<()> {
        client.authenticate(&self.credentials)?;
        if !client.capabilities()?.has("UIDL") {
            return Err(Error::Unsupported("server does not support UIDL".to_string()));
        }
        let stat = client.stat()?;
        *failures = 0;
        self.events.message_count(stat.count);
        if stat.count == 0 {
            return Ok(());
        }

        for uid in client.list_uids()? {
            let Some(file_name) = MailboxPaths::file_name(&uid.id) else {
                warn!("skipping message {}: unique id is not usable as a file name", uid);
                continue;
            };
            if self.paths.contains(&file_name) {
                self.events.previously_downloaded(&uid);
                self.delete(client, &uid)?;
                continue;
            }

            self.events.message_requested(&uid);
            let path = self.persist(client, &uid, &file_name)?;
            self.delete(client, &uid)?;
            *received += 1;
            self.events.message_received(&path);
        }
        Ok(())
    }

    fn delete(&self, client: &mut Client<C::Stream>, uid: &MessageUid) -> Result<()> {
        let reply = client.delete(uid.number)?;
        if !reply.is_ok() {
            warn!("DELE {} failed: {}", uid, reply);
        }
        Ok(())
    }

    /// Stream a message into the temp file and move it into the queue.
    fn persist(
        &self,
        client: &mut Client<C::Stream>,
        uid: &MessageUid,
        file_name: &str,
    ) -> Result<PathBuf> {
        let mut writer = BufWriter::new(File::create(&self.paths.temp_file)?);
        let bytes = client.write_message_to(uid.number, false, &mut writer)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        let target = self.paths.queue.join(file_name);
        fs::rename(&self.paths.temp_file, &target)?;
        debug!("stored {} ({} bytes) as {}", uid, bytes, target.display());
        Ok(target)
    }

    fn discard_temp_file(&self) {
        if self.paths.temp_file.exists() {
            if let Err(e) = fs::remove_file(&self.paths.temp_file) {
                warn!("could not remove {}: {}", self.paths.temp_file.display(), e);
            }
        }
    }
}
