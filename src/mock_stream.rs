use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::conn::Transport;

/// Everything a [`MockStream`] was sent, shared so it can be inspected after the stream has
/// been moved into (and consumed by) a client.
#[derive(Clone, Debug, Default)]
pub struct Transcript(Arc<Mutex<Vec<u8>>>);

impl Transcript {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[derive(Debug)]
pub struct MockStream {
    read_buf: Vec<u8>,
    read_pos: usize,
    written: Transcript,
    err_on_read: bool,
    eof_on_read: bool,
    exhausted: ErrorKind,
    read_delay: usize,
    pub timeouts: Vec<Option<Duration>>,
}

impl Default for MockStream {
    fn default() -> Self {
        MockStream {
            read_buf: Vec::new(),
            read_pos: 0,
            written: Transcript::default(),
            err_on_read: false,
            eof_on_read: false,
            exhausted: ErrorKind::UnexpectedEof,
            read_delay: 0,
            timeouts: Vec::new(),
        }
    }
}

impl MockStream {
    pub fn new(read_buf: impl Into<Vec<u8>>) -> MockStream {
        MockStream::default().with_buf(read_buf.into())
    }

    pub fn with_buf(mut self, read_buf: Vec<u8>) -> MockStream {
        self.read_buf = read_buf;
        self
    }

    pub fn with_eof(mut self) -> MockStream {
        self.eof_on_read = true;
        self
    }

    pub fn with_err(mut self) -> MockStream {
        self.err_on_read = true;
        self
    }

    /// Once the scripted bytes run out, fail reads with a socket timeout.
    pub fn with_timeout(mut self) -> MockStream {
        self.exhausted = ErrorKind::TimedOut;
        self
    }

    pub fn with_delay(mut self) -> MockStream {
        self.read_delay = 1;
        self
    }

    pub fn transcript(&self) -> Transcript {
        self.written.clone()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_on_read {
            return Ok(0);
        }
        if self.err_on_read {
            return Err(Error::new(ErrorKind::Other, "MockStream Error"));
        }
        if self.read_pos >= self.read_buf.len() {
            return Err(Error::new(self.exhausted, "MockStream exhausted"));
        }
        let mut write_len = min(buf.len(), self.read_buf.len() - self.read_pos);
        if self.read_delay > 0 {
            self.read_delay -= 1;
            write_len = min(write_len, 1);
        }
        let max_pos = self.read_pos + write_len;
        buf[..write_len].copy_from_slice(&self.read_buf[self.read_pos..max_pos]);
        self.read_pos = max_pos;
        Ok(write_len)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Transport for MockStream {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.timeouts.push(timeout);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
