//! Decoding of received messages.
//!
//! [`MimeParser`] turns the line stream of one message, as retrieved from the server or read
//! back from disk, into a [`ParsedMessage`]. It handles folded headers, RFC 2047 encoded-words,
//! nested multiparts and the quoted-printable and base64 transfer encodings.
//!
//! [`MimeParser::parse`] reads a raw POP3 transfer: a lone `.` line ends the message and
//! byte-stuffed dots are removed, so it can be handed an undrained `RETR` reply directly.
//! [`MimeParser::parse_complete`] reads a stream holding exactly one message, such as a stored
//! `.eml` file, where every line is content.
//!
//! ```
//! use popfree::mime::MimeParser;
//!
//! let raw = "Subject: =?UTF-8?B?SGVsbG8=?=\r\n\r\nHi there\r\n";
//! let message = MimeParser::new().parse(raw.as_bytes()).unwrap();
//! assert_eq!(message.subject(), Some("Hello"));
//! assert_eq!(message.body(), Some("Hi there\r\n"));
//! ```

use std::io::{self, BufRead};

mod address;
mod content_type;
pub mod encoded_word;
mod header;
mod line;
mod media;
mod message;
mod transfer;

pub use self::address::Address;
pub use self::content_type::ContentType;
pub use self::header::{header_kind, HeaderKind, HeaderTable};
pub use self::line::LineKind;
pub use self::media::{ExtensionMap, DEFAULT_EXTENSION};
pub use self::message::{AlternateView, Attachment, ParsedMessage, Part};
pub use self::transfer::{TransferEncoding, DEFAULT_CHARSET};

use self::header::read_header_block;
use self::line::{Framing, LineCursor};
use self::transfer::{decode_text, lookup_charset, BodyDecoder};
use crate::error::{MimeError, Result};

/// Default limit on how deeply multiparts may nest.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// A reusable message decoder.
#[derive(Clone, Debug)]
pub struct MimeParser {
    max_depth: usize,
}

impl Default for MimeParser {
    fn default() -> Self {
        MimeParser {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl MimeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how deeply multiparts may nest before parsing fails with
    /// [`MimeError::NestingTooDeep`].
    pub fn max_depth(&mut self, depth: usize) -> &mut Self {
        self.max_depth = depth;
        self
    }

    /// Decode a whole message from a raw POP3 transfer, up to its terminating `.` line.
    ///
    /// Fails with [`MimeError::MissingHeaders`] if the stream does not start with a header
    /// block. Malformed address headers do not fail the parse; those fields are left empty.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<ParsedMessage> {
        self.parse_framed(LineCursor::new(reader))
    }

    /// Decode a stream that holds exactly one message, without dot-stuffing.
    ///
    /// Lines consisting of a single `.` are content here. Use this for stored messages and
    /// for the output of a [`MessageReader`](crate::MessageReader).
    pub fn parse_complete<R: BufRead>(&self, reader: R) -> Result<ParsedMessage> {
        self.parse_framed(LineCursor::with_framing(reader, Framing::Complete))
    }

    fn parse_framed<R: BufRead>(&self, mut cursor: LineCursor<R>) -> Result<ParsedMessage> {
        let mut raw = String::new();
        let headers = read_header_block(&mut cursor, None, Some(&mut raw))?
            .ok_or(MimeError::MissingHeaders)?;
        let content_type = ContentType::resolve(&headers, None);
        let encoding = TransferEncoding::from_header(headers.get("Content-Transfer-Encoding"));
        let mut message = ParsedMessage::new(headers, raw);

        if content_type.is_text_body() {
            let (bytes, _) = read_part(&mut cursor, encoding, None)?;
            message.body = Some(decode_text(&bytes, lookup_charset(content_type.charset())));
            message.is_html = content_type.is_html();
        } else if let Some(boundary) = content_type.boundary() {
            let (parts, kind) = self.load_multipart(&mut cursor, boundary, 1)?;
            for part in parts {
                match part {
                    Part::View(view) => message.alternate_views.push(view),
                    Part::Attachment(attachment) => message.attachments.push(attachment),
                }
            }
            if kind != LineKind::Terminator {
                // epilogue
                cursor.scroll(None)?;
            }
        } else {
            let (data, _) = read_part(&mut cursor, encoding, None)?;
            message.attachments.push(Attachment { content_type, data });
        }
        Ok(message)
    }

    /// Decode only the header block of a raw POP3 transfer.
    pub fn parse_headers<R: BufRead>(&self, reader: R) -> Result<HeaderTable> {
        self.headers_framed(LineCursor::new(reader))
    }

    /// Decode only the header block of a stream holding exactly one message.
    pub fn parse_headers_complete<R: BufRead>(&self, reader: R) -> Result<HeaderTable> {
        self.headers_framed(LineCursor::with_framing(reader, Framing::Complete))
    }

    fn headers_framed<R: BufRead>(&self, mut cursor: LineCursor<R>) -> Result<HeaderTable> {
        read_header_block(&mut cursor, None, None)?.ok_or_else(|| MimeError::MissingHeaders.into())
    }

    /// Load the parts of one multipart, returning them with the line kind that ended it.
    fn load_multipart<R: BufRead>(
        &self,
        cursor: &mut LineCursor<R>,
        boundary: &str,
        depth: usize,
    ) -> Result<(Vec<Part>, LineKind)> {
        if depth > self.max_depth {
            return Err(MimeError::NestingTooDeep {
                limit: self.max_depth,
            }
            .into());
        }

        let mut parts = Vec::new();
        // preamble
        let mut kind = cursor.scroll(Some(boundary))?;
        while kind == LineKind::Boundary && !cursor.at_eof()? {
            kind = self.load_body_part(cursor, boundary, depth, &mut parts)?;
        }
        log::debug!(
            "multipart at depth {} ended with {:?} after {} part(s)",
            depth,
            kind,
            parts.len()
        );
        Ok((parts, kind))
    }

    /// Load one part of the multipart delimited by `boundary`, returning the line kind that
    /// ended it.
    fn load_body_part<R: BufRead>(
        &self,
        cursor: &mut LineCursor<R>,
        boundary: &str,
        depth: usize,
        parts: &mut Vec<Part>,
    ) -> Result<LineKind> {
        let headers = read_header_block(cursor, Some(boundary), None)?.unwrap_or_default();
        let local = ContentType::resolve(&headers, None);

        if let Some(inner) = local.boundary().filter(|_| local.is_multipart()) {
            let (nested, kind) = self.load_multipart(cursor, inner, depth + 1)?;
            if local.is_apple_double() {
                // the resource fork is of no use off a Mac
                if let Some(data_fork) = nested.into_iter().nth(1) {
                    parts.push(Part::Attachment(data_fork.into_attachment()));
                }
            } else {
                parts.extend(nested);
            }
            if kind == LineKind::Terminator {
                return Ok(kind);
            }
            return Ok(cursor.scroll(Some(boundary))?);
        }

        let content_type = ContentType::resolve(&headers, Some(boundary));
        let encoding = TransferEncoding::from_header(headers.get("Content-Transfer-Encoding"));
        let (data, kind) = read_part(cursor, encoding, Some(boundary))?;
        if content_type.is_text_body() {
            let text = decode_text(&data, lookup_charset(content_type.charset()));
            parts.push(Part::View(AlternateView { content_type, text }));
        } else {
            parts.push(Part::Attachment(Attachment { content_type, data }));
        }
        Ok(kind)
    }
}

/// Transfer-decode lines up to the end of the current part.
fn read_part<R: BufRead>(
    cursor: &mut LineCursor<R>,
    encoding: TransferEncoding,
    boundary: Option<&str>,
) -> io::Result<(Vec<u8>, LineKind)> {
    let mut decoder = BodyDecoder::new(encoding);
    while let Some(line) = cursor.next_line()? {
        let kind = cursor.classify(&line, boundary);
        if kind.is_break() {
            return Ok((decoder.finish(), kind));
        }
        decoder.push_line(&line);
    }
    Ok((decoder.finish(), LineKind::Terminator))
}
