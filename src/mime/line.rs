//! Line-level view of a MIME stream.

use std::io::{self, BufRead};

/// What a single line means to the multipart scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Content, including blank lines.
    Normal,
    /// `--boundary`: ends the current part and starts the next one.
    Boundary,
    /// `--boundary--`: ends the enclosing multipart.
    TerminalBoundary,
    /// A lone `.`, the end of a POP3 transfer. End of stream is reported the same way.
    Terminator,
}

impl LineKind {
    /// Classify `line`, given without its line terminator, against an optional boundary.
    ///
    /// A lone `.` is a terminator whatever the boundary is. Trailing whitespace after a
    /// boundary delimiter is tolerated, as RFC 2046 allows it.
    pub fn classify(line: &[u8], boundary: Option<&str>) -> LineKind {
        if line == b"." {
            return LineKind::Terminator;
        }
        Self::classify_delimiter(line, boundary)
    }

    /// Like [`classify`](Self::classify), but a lone `.` is ordinary content.
    ///
    /// This is the rule for lines whose dot-stuffing has already been undone, where the end of
    /// the transfer was recognised before the line reached the parser.
    pub fn classify_delimiter(line: &[u8], boundary: Option<&str>) -> LineKind {
        let boundary = match boundary {
            Some(b) if !b.is_empty() => b.as_bytes(),
            _ => return LineKind::Normal,
        };
        let end = line
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |i| i + 1);
        let rest = match line[..end]
            .strip_prefix(b"--")
            .and_then(|l| l.strip_prefix(boundary))
        {
            Some(rest) => rest,
            None => return LineKind::Normal,
        };
        match rest {
            b"" => LineKind::Boundary,
            b"--" => LineKind::TerminalBoundary,
            _ => LineKind::Normal,
        }
    }

    /// Anything that ends the current part.
    pub fn is_break(self) -> bool {
        self != LineKind::Normal
    }
}

/// How the end of a message is recognised in the underlying stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Framing {
    /// A raw `RETR`/`TOP` transfer: a lone `.` ends it and leading dots are byte-stuffed.
    Transfer,
    /// The stream holds exactly one message, as stored on disk or unstuffed by
    /// [`MessageReader`](crate::MessageReader). Only the end of the stream ends it.
    Complete,
}

/// Pulls lines out of a reader one at a time, with room to put one back.
///
/// Once the end of the message has been seen nothing more is read from the reader.
pub(crate) struct LineCursor<R> {
    reader: R,
    framing: Framing,
    pending: Option<Vec<u8>>,
    finished: bool,
}

impl<R: BufRead> LineCursor<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self::with_framing(reader, Framing::Transfer)
    }

    pub(crate) fn with_framing(reader: R, framing: Framing) -> Self {
        LineCursor {
            reader,
            framing,
            pending: None,
            finished: false,
        }
    }

    /// The next content line with its CRLF or LF removed, or `None` at the end of the message.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        if self.finished {
            return Ok(None);
        }
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            self.finished = true;
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        if self.framing == Framing::Transfer {
            if LineKind::classify(&line, None) == LineKind::Terminator {
                self.finished = true;
                return Ok(None);
            }
            if line.starts_with(b"..") {
                line.remove(0);
            }
        }
        Ok(Some(line))
    }

    /// Classify a content line returned by [`next_line`](Self::next_line).
    ///
    /// The terminator was already consumed by the cursor, so a `.` seen here is content.
    pub(crate) fn classify(&self, line: &[u8], boundary: Option<&str>) -> LineKind {
        LineKind::classify_delimiter(line, boundary)
    }

    pub(crate) fn push_back(&mut self, line: Vec<u8>) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(line);
    }

    pub(crate) fn at_eof(&mut self) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(false);
        }
        match self.next_line()? {
            Some(line) => {
                self.pending = Some(line);
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Skip lines until one that ends the current part and return its kind.
    pub(crate) fn scroll(&mut self, boundary: Option<&str>) -> io::Result<LineKind> {
        while let Some(line) = self.next_line()? {
            let kind = self.classify(&line, boundary);
            if kind.is_break() {
                return Ok(kind);
            }
        }
        Ok(LineKind::Terminator)
    }
}
