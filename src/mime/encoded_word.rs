//! RFC 2047 encoded-words in header values.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

use super::transfer::{decode_base64, decode_qp_into, decode_text, lookup_charset};

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").unwrap();
}

/// Decode every encoded-word in `text`, leaving the rest untouched.
///
/// Whitespace between two adjacent encoded-words is dropped, so that a long value split over
/// several words comes back in one piece. Words that cannot be decoded are kept verbatim.
pub fn decode(text: &str) -> Cow<'_, str> {
    if !text.contains("=?") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut after_word = false;
    for captures in ENCODED_WORD.captures_iter(text) {
        let (Some(word), Some(charset), Some(encoding), Some(payload)) = (
            captures.get(0),
            captures.get(1),
            captures.get(2),
            captures.get(3),
        ) else {
            continue;
        };

        let gap = &text[last..word.start()];
        if !(after_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }
        match decode_word(charset.as_str(), encoding.as_str(), payload.as_str()) {
            Some(decoded) => {
                out.push_str(&decoded);
                after_word = true;
            }
            None => {
                out.push_str(word.as_str());
                after_word = false;
            }
        }
        last = word.end();
    }
    out.push_str(&text[last..]);
    Cow::Owned(out)
}

fn decode_word(charset: &str, encoding: &str, payload: &str) -> Option<String> {
    let bytes = if encoding.eq_ignore_ascii_case("B") {
        let valid = payload
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
        if !valid {
            return None;
        }
        decode_base64(payload.as_bytes())?
    } else {
        // `_` stands for a space regardless of charset
        let payload = payload.replace('_', " ");
        let mut bytes = Vec::with_capacity(payload.len());
        decode_qp_into(payload.as_bytes(), &mut bytes);
        bytes
    };
    Some(decode_text(&bytes, lookup_charset(charset)))
}

/// Whether `text` opens with an encoded-word.
pub(crate) fn starts_with_word(text: &str) -> bool {
    ENCODED_WORD.find(text).map_or(false, |m| m.start() == 0)
}

/// Whether `text` closes with an encoded-word.
pub(crate) fn ends_with_word(text: &str) -> bool {
    ENCODED_WORD
        .find_iter(text)
        .last()
        .map_or(false, |m| m.end() == text.len())
}
