use std::fmt;
use std::slice::Iter;

use crate::utils::iter_join_onto;

/// From [RFC 2449](https://tools.ietf.org/html/rfc2449).
///
/// The capabilities a server advertises in response to `CAPA`, one per line. Each line starts
/// with a capability tag, optionally followed by parameters (for example `SASL PLAIN LOGIN`).
///
/// Servers that predate RFC 2449 reply to `CAPA` with `-ERR`; they are represented by an empty
/// set of capabilities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(pub(crate) Vec<String>);

impl Capabilities {
    pub(crate) fn from_lines(lines: Vec<String>) -> Capabilities {
        Capabilities(
            lines
                .into_iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        )
    }

    /// Check if the server has the given capability tag, ignoring case.
    pub fn has(&self, tag: &str) -> bool {
        self.0.iter().any(|line| {
            line.split_whitespace()
                .next()
                .map_or(false, |t| t.eq_ignore_ascii_case(tag))
        })
    }

    /// Iterate over all the raw capability lines.
    pub fn iter(&self) -> Iter<'_, String> {
        self.0.iter()
    }

    /// Returns how many capabilities the server has.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the server purports to have no capabilities.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        iter_join_onto(f, self.0.iter(), ", ")
    }
}
