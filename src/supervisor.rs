//! Retrieval and extraction running side by side.

use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use rayon::{Scope, ThreadPoolBuilder};

use crate::authenticator::Credentials;
use crate::error::{Error, Result};
use crate::sync::{Connector, MailboxSync, SyncEvents, SyncOptions};
use crate::types::MessageUid;
use crate::worker::{MimeFileWorker, ProcessingEvents};

fn lock(total: &Mutex<u32>) -> MutexGuard<'_, u32> {
    total.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drains a maildrop while a thread pool extracts what arrives.
///
/// Files left in the queue by an earlier run are submitted first. Every message the sync
/// stores is then submitted as soon as it lands. [`run`](MailSupervisor::run) returns once
/// the sync has finished and every submitted file has been processed.
pub struct MailSupervisor<C> {
    connector: C,
    credentials: Credentials,
    worker: MimeFileWorker,
    options: SyncOptions,
    threads: usize,
}

impl<C: Connector> MailSupervisor<C> {
    pub fn new(connector: C, credentials: Credentials, worker: MimeFileWorker) -> Self {
        MailSupervisor {
            connector,
            credentials,
            worker,
            options: SyncOptions::default(),
            threads: 0,
        }
    }

    /// Replace the retry and timeout policy of the sync.
    pub fn options(&mut self, options: SyncOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Number of extraction threads. `0`, the default, lets rayon pick one per CPU.
    pub fn threads(&mut self, threads: usize) -> &mut Self {
        self.threads = threads;
        self
    }

    /// Run the sync and the extraction of everything queued, returning the number of new
    /// messages retrieved.
    ///
    /// A failed sync is only reported after the files already submitted have been processed.
    pub fn run(&self) -> Result<u32> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("popfree-worker-{}", i))
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let total = Mutex::new(0u32);
        let worker = &self.worker;
        let log = ProcessingLog { total: &total };

        // the scope does not return before every job spawned in it, however late, is done
        let result = pool.in_place_scope(|scope| -> Result<u32> {
            for file in worker.paths().queued_files()? {
                debug!("submitting queued file {}", file.display());
                scope.spawn(move |_| worker.process(&file, &log));
            }
            let events = SupervisorEvents { scope, worker, log };
            let mut sync = MailboxSync::new(
                &self.connector,
                self.credentials.clone(),
                worker.paths().clone(),
                &events,
            );
            sync.options(self.options.clone());
            sync.download_messages()
        });

        let total = *lock(&total);
        match result {
            Ok(_) => {
                info!("{} message(s) processed", total);
                Ok(total)
            }
            Err(e) => {
                error!("sync failed after {} message(s): {}", total, e);
                Err(e)
            }
        }
    }
}

/// Logs extraction progress, serialised with the running total.
#[derive(Clone, Copy)]
struct ProcessingLog<'a> {
    total: &'a Mutex<u32>,
}

impl ProcessingEvents for ProcessingLog<'_> {
    fn begin_processing(&self, file: &Path) {
        let _guard = lock(self.total);
        info!("processing {}", file.display());
    }

    fn done_processing(&self, file: &Path) {
        let _guard = lock(self.total);
        info!("done processing {}", file.display());
    }

    fn processing_error(&self, file: &Path, error: &Error) {
        let _guard = lock(self.total);
        error!("error processing {}: {}", file.display(), error);
    }

    fn processing_warning(&self, file: &Path, message: &str) {
        let _guard = lock(self.total);
        warn!("{}: {}", file.display(), message);
    }
}

struct SupervisorEvents<'a, 'scope> {
    scope: &'a Scope<'scope>,
    worker: &'scope MimeFileWorker,
    log: ProcessingLog<'scope>,
}

impl SyncEvents for SupervisorEvents<'_, '_> {
    fn message_count(&self, count: u32) {
        let _guard = lock(self.log.total);
        info!("{} message(s) on the server", count);
    }

    fn message_requested(&self, uid: &MessageUid) {
        let _guard = lock(self.log.total);
        info!("retrieving message {}", uid);
    }

    fn message_received(&self, path: &Path) {
        {
            let mut total = lock(self.log.total);
            *total += 1;
            info!("received {} ({} so far)", path.display(), *total);
        }
        let path = path.to_path_buf();
        let worker = self.worker;
        let log = self.log;
        self.scope.spawn(move |_| worker.process(&path, &log));
    }

    fn previously_downloaded(&self, uid: &MessageUid) {
        let _guard = lock(self.log.total);
        info!("message {} was retrieved before, deleting it", uid);
    }

    fn server_error(&self, error: &Error) {
        let _guard = lock(self.log.total);
        warn!("server error: {}", error);
    }
}
