//! Content-Transfer-Encoding and charset decoding.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use encoding_rs::{Encoding, WINDOWS_1252};

/// Base64 as found in the wild: padding optional, stray trailing bits ignored.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// The charset assumed when none is declared or the declared one is unknown.
///
/// RFC 2045 specifies US-ASCII; ISO-8859-1 is a superset that also covers the unlabelled
/// 8-bit mail found in practice. Like every WHATWG decoder, `encoding_rs` maps that label to
/// windows-1252.
pub const DEFAULT_CHARSET: &str = "iso-8859-1";

/// Look up a charset label, falling back to [`DEFAULT_CHARSET`].
///
/// RFC 2231 language suffixes (`utf-8*en`) are ignored.
pub fn lookup_charset(label: &str) -> &'static Encoding {
    let label = label.split('*').next().unwrap_or("").trim();
    Encoding::for_label_no_replacement(label.as_bytes()).unwrap_or(WINDOWS_1252)
}

/// Decode `bytes` to text, stripping any byte order mark.
pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    encoding.decode_with_bom_removal(bytes).0.into_owned()
}

/// Header text is supposed to be ASCII; anything else is taken as UTF-8 when valid and as the
/// default charset otherwise.
pub(crate) fn header_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

/// Decode base64, skipping anything outside the alphabet as RFC 2045 asks.
///
/// Padding ends a quantum, so encoders that pad every line separately are decoded one padded
/// run at a time.
pub(crate) fn decode_base64(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut chunk = Vec::new();
    let mut padded = false;
    for &b in input {
        if b == b'=' {
            padded = true;
        } else if b.is_ascii_alphanumeric() || b == b'+' || b == b'/' {
            if padded {
                decode_base64_chunk(&mut chunk, &mut out)?;
                padded = false;
            }
            chunk.push(b);
        }
    }
    decode_base64_chunk(&mut chunk, &mut out)?;
    Some(out)
}

fn decode_base64_chunk(chunk: &mut Vec<u8>, out: &mut Vec<u8>) -> Option<()> {
    // a single dangling sextet cannot encode anything
    if chunk.len() % 4 == 1 {
        chunk.pop();
    }
    LENIENT_BASE64.decode_vec(&chunk[..], out).ok()?;
    chunk.clear();
    Some(())
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode `=XX` escapes, passing invalid sequences through untransformed.
pub(crate) fn decode_qp_into(input: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'=' && i + 2 < input.len() {
            if let (Some(hi), Some(lo)) = (hex_value(input[i + 1]), hex_value(input[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
}

/// The `Content-Transfer-Encoding` of a body part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferEncoding {
    /// `7bit`, `8bit`, `binary`, or anything unrecognised: lines are taken verbatim.
    Identity,
    /// `quoted-printable`.
    QuotedPrintable,
    /// `base64`.
    Base64,
}

impl TransferEncoding {
    /// Interpret the value of a `Content-Transfer-Encoding` header.
    pub fn from_header(value: Option<&str>) -> TransferEncoding {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("quoted-printable") => TransferEncoding::QuotedPrintable,
            Some("base64") => TransferEncoding::Base64,
            _ => TransferEncoding::Identity,
        }
    }
}

/// Accumulates the lines of one body part and produces its decoded bytes.
///
/// Bytes are collected for the whole part before any charset decoding, so multi-byte
/// characters split by a soft line break or across base64 lines come out intact.
pub(crate) struct BodyDecoder {
    encoding: TransferEncoding,
    bytes: Vec<u8>,
}

impl BodyDecoder {
    pub(crate) fn new(encoding: TransferEncoding) -> Self {
        BodyDecoder {
            encoding,
            bytes: Vec::new(),
        }
    }

    /// Add one line, given without its line terminator.
    pub(crate) fn push_line(&mut self, line: &[u8]) {
        match self.encoding {
            TransferEncoding::Identity => {
                self.bytes.extend_from_slice(line);
                self.bytes.extend_from_slice(b"\r\n");
            }
            TransferEncoding::Base64 => self.bytes.extend_from_slice(line),
            TransferEncoding::QuotedPrintable => {
                // trailing whitespace was added in transport and must be dropped
                let end = line
                    .iter()
                    .rposition(|b| *b != b' ' && *b != b'\t')
                    .map_or(0, |i| i + 1);
                let line = &line[..end];
                match line.strip_suffix(b"=") {
                    Some(soft) => decode_qp_into(soft, &mut self.bytes),
                    None => {
                        decode_qp_into(line, &mut self.bytes);
                        self.bytes.extend_from_slice(b"\r\n");
                    }
                }
            }
        }
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        match self.encoding {
            TransferEncoding::Base64 => decode_base64(&self.bytes).unwrap_or_default(),
            _ => self.bytes,
        }
    }
}
