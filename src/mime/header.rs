//! Header blocks: unfolding, decoding and the singleton/multi storage policy.

use std::io::{self, BufRead};

use lazy_static::lazy_static;
use regex::Regex;

use super::encoded_word;
use super::line::LineCursor;
use super::transfer::header_text;

lazy_static! {
    static ref HEADER_LINE: Regex = Regex::new(r"^([^:]+):\s?(.*)$").unwrap();
}

/// How repeated occurrences of a header are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// All occurrences and continuation lines are joined into one value.
    Singleton,
    /// Every occurrence and continuation line is kept as its own value.
    Multi,
}

use HeaderKind::{Multi, Singleton};

const HEADER_KINDS: &[(&str, HeaderKind)] = &[
    ("Bcc", Singleton),
    ("Cc", Multi),
    ("Comments", Multi),
    ("Content-Description", Singleton),
    ("Content-Disposition", Singleton),
    ("Content-ID", Singleton),
    ("Content-Location", Singleton),
    ("Content-Transfer-Encoding", Singleton),
    ("Content-Type", Singleton),
    ("Date", Singleton),
    ("From", Singleton),
    ("Importance", Singleton),
    ("In-Reply-To", Singleton),
    ("Keywords", Multi),
    ("List-Help", Singleton),
    ("List-Id", Singleton),
    ("List-Post", Singleton),
    ("List-Unsubscribe", Singleton),
    ("Mailing-List", Singleton),
    ("Message-ID", Singleton),
    ("MIME-Version", Singleton),
    ("Priority", Singleton),
    ("References", Singleton),
    ("Reply-To", Singleton),
    ("Resent-Bcc", Multi),
    ("Resent-Cc", Multi),
    ("Resent-Date", Multi),
    ("Resent-From", Multi),
    ("Resent-Message-ID", Multi),
    ("Resent-Sender", Multi),
    ("Resent-To", Multi),
    ("Sender", Singleton),
    ("Subject", Singleton),
    ("To", Multi),
    ("X-Priority", Singleton),
    ("X-Receiver", Multi),
    ("X-Sender", Singleton),
];

/// The storage policy for `name`. Headers not in the table are [`HeaderKind::Multi`].
pub fn header_kind(name: &str) -> HeaderKind {
    HEADER_KINDS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map_or(Multi, |(_, kind)| *kind)
}

/// Decoded headers in the order they first appeared, looked up case-insensitively.
///
/// Besides the stored values, the table keeps the unfolded text of every physical occurrence
/// of a header, which is what structured fields such as address lists are parsed from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: Vec<(String, Vec<String>)>,
    occurrences: Vec<(String, String)>,
}

impl HeaderTable {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Add `value` as one complete occurrence of `name`.
    #[cfg(test)]
    pub(crate) fn push(&mut self, name: &str, value: String) {
        self.push_occurrence(name, value.clone());
        self.push_value(name, value);
    }

    fn push_value(&mut self, name: &str, value: String) {
        match self.position(name) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((name.to_string(), vec![value])),
        }
    }

    /// The first value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Every value of `name`, in order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map_or(&[][..], |i| self.entries[i].1.as_slice())
    }

    fn push_occurrence(&mut self, name: &str, text: String) {
        self.occurrences.push((name.to_string(), text));
    }

    /// Every occurrence of `name`, each unfolded onto one line, joined with commas.
    ///
    /// Unlike [`get_all`](Self::get_all), continuation lines stay part of the occurrence they
    /// belong to, so a mailbox folded over two lines comes back whole.
    pub fn unfolded(&self, name: &str) -> Option<String> {
        let texts: Vec<&str> = self
            .occurrences
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, text)| text.as_str())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join(","))
        }
    }

    /// Whether `name` has at least one value.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate over header names and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no headers at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Physical lines belonging to one header name, grouped by occurrence, before any decoding.
type RawHeader = (String, Vec<Vec<String>>);

fn find_raw(raw: &[RawHeader], name: &str) -> Option<usize> {
    raw.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
}

/// Read one header block, up to and including the blank line that ends it.
///
/// Returns `None` when no header line was found. A line that ends the enclosing part (given
/// its `boundary`) also ends the block and is left for the caller to read. When `raw_text` is
/// given, every line consumed is appended to it verbatim with CRLF.
pub(crate) fn read_header_block<R: BufRead>(
    cursor: &mut LineCursor<R>,
    boundary: Option<&str>,
    mut raw_text: Option<&mut String>,
) -> io::Result<Option<HeaderTable>> {
    let mut raw: Vec<RawHeader> = Vec::new();
    let mut last: Option<usize> = None;

    while let Some(line) = cursor.next_line()? {
        if cursor.classify(&line, boundary).is_break() {
            cursor.push_back(line);
            break;
        }
        let text = header_text(&line);
        if let Some(buffer) = raw_text.as_deref_mut() {
            buffer.push_str(&text);
            buffer.push_str("\r\n");
        }
        if text.trim().is_empty() {
            break;
        }

        if text.starts_with([' ', '\t']) {
            match last {
                Some(i) => {
                    if let Some(occurrence) = raw[i].1.last_mut() {
                        occurrence.push(text.trim_start().to_string());
                    }
                }
                None => log::debug!("dropping continuation line without a header"),
            }
            continue;
        }

        match HEADER_LINE.captures(&text) {
            Some(captures) => {
                let name = captures.get(1).map_or("", |m| m.as_str()).trim_end();
                let value = captures.get(2).map_or("", |m| m.as_str());
                let index = match find_raw(&raw, name) {
                    Some(i) => i,
                    None => {
                        raw.push((name.to_string(), Vec::new()));
                        raw.len() - 1
                    }
                };
                raw[index].1.push(vec![value.to_string()]);
                last = Some(index);
            }
            None => {
                log::debug!("skipping malformed header line {:?}", text);
                last = None;
            }
        }
    }

    if raw.is_empty() {
        return Ok(None);
    }

    let mut table = HeaderTable::default();
    for (name, occurrences) in raw {
        for occurrence in &occurrences {
            let text = join_segments(occurrence);
            if !text.is_empty() {
                table.push_occurrence(&name, text);
            }
        }
        match header_kind(&name) {
            HeaderKind::Singleton => {
                let value = join_segments(&occurrences.concat());
                if !value.is_empty() {
                    table.push_value(&name, value);
                }
            }
            HeaderKind::Multi => {
                for segment in occurrences.iter().flatten() {
                    let value = encoded_word::decode(segment.trim());
                    if !value.is_empty() {
                        table.push_value(&name, value.into_owned());
                    }
                }
            }
        }
    }
    Ok(Some(table))
}

/// Unfold the segments of a singleton header into one decoded value.
fn join_segments(segments: &[String]) -> String {
    let mut out = String::new();
    let mut after_word = false;
    for segment in segments.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.is_empty() && !(after_word && encoded_word::starts_with_word(segment)) {
            out.push(' ');
        }
        out.push_str(&encoded_word::decode(segment));
        after_word = encoded_word::ends_with_word(segment);
    }
    out
}
