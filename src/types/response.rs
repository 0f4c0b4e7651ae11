use std::fmt;
use std::str::FromStr;

use crate::parse::parse_status_line;

const EMPTY_RESPONSE: &str = "POP server sent an empty response.";

/// A single-line server reply: the status indicator followed by whitespace-separated
/// parameters.
///
/// Built once per command round-trip and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    raw: String,
    success: bool,
    params: Vec<String>,
}

impl Response {
    /// Parse one line as sent by the server, with or without its trailing CRLF.
    pub(crate) fn parse(line: &str) -> Response {
        let line = line.trim_end_matches(['\r', '\n']);
        match parse_status_line(line) {
            Some((status, params)) => Response {
                raw: line.to_string(),
                success: status.eq_ignore_ascii_case("+OK"),
                params: params.split_whitespace().map(str::to_string).collect(),
            },
            None => Response {
                raw: EMPTY_RESPONSE.to_string(),
                success: false,
                params: Vec::new(),
            },
        }
    }

    /// The line exactly as the server sent it, minus the line terminator.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the status indicator was `+OK`.
    pub fn is_ok(&self) -> bool {
        self.success
    }

    /// All tokens following the status indicator.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The `index`th parameter, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The `index`th parameter interpreted as a number.
    ///
    /// Returns `None` when the parameter is missing or is not numeric.
    pub fn number<N: FromStr>(&self, index: usize) -> Option<N> {
        self.param(index).and_then(|p| p.parse().ok())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_params() {
        let r = Response::parse("+OK 2 320\r\n");
        assert!(r.is_ok());
        assert_eq!(r.raw(), "+OK 2 320");
        assert_eq!(r.params(), &["2".to_string(), "320".to_string()]);
        assert_eq!(r.number::<u32>(0), Some(2));
        assert_eq!(r.number::<u64>(1), Some(320));
        assert_eq!(r.number::<u32>(2), None);
    }

    #[test]
    fn numbers_are_parsed_per_parameter() {
        let r = Response::parse("+OK 7 octets follow");
        assert_eq!(r.number::<u32>(0), Some(7));
        assert_eq!(r.number::<u32>(1), None);
    }

    #[test]
    fn failure() {
        let r = Response::parse("-ERR [IN-USE] mailbox locked");
        assert!(!r.is_ok());
        assert_eq!(r.param(0), Some("[IN-USE]"));
    }

    #[test]
    fn bare_ok() {
        let r = Response::parse("+OK");
        assert!(r.is_ok());
        assert!(r.params().is_empty());
    }

    #[test]
    fn empty_line() {
        let r = Response::parse("\r\n");
        assert!(!r.is_ok());
        assert_eq!(r.raw(), EMPTY_RESPONSE);
    }
}
