//! Mailbox addresses in `From`, `To` and friends.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ADDR_SPEC: Regex =
        Regex::new(r#"^[^\s@<>()\[\],;:"\\]+@[^\s@<>()\[\],;:"\\]+$"#).unwrap();
}

/// A mailbox: an address with an optional display name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    name: Option<String>,
    address: String,
}

impl Address {
    /// Parse a single mailbox such as `"Jane Doe" <jane@example.com>` or `jane@example.com`.
    ///
    /// Returns `None` if the text is not a valid mailbox.
    pub fn parse(text: &str) -> Option<Address> {
        let text = text.trim();
        if let Some(open) = text.find('<') {
            let close = open + text[open..].find('>')?;
            let rest = text[close + 1..].trim();
            if !rest.is_empty() && !(rest.starts_with('(') && rest.ends_with(')')) {
                return None;
            }
            let address = text[open + 1..close].trim();
            return Self::validated(display_name(&text[..open]), address);
        }

        // legacy `addr (Display Name)`
        match text.find('(') {
            Some(open) if text.ends_with(')') => {
                let name = display_name(&text[open + 1..text.len() - 1]);
                Self::validated(name, text[..open].trim())
            }
            _ => Self::validated(None, text),
        }
    }

    fn validated(name: Option<String>, address: &str) -> Option<Address> {
        if !ADDR_SPEC.is_match(address) {
            return None;
        }
        Some(Address {
            name,
            address: address.to_string(),
        })
    }

    /// Parse a comma-separated address list, flattening groups.
    ///
    /// Empty members are skipped. Returns `None` if any member is invalid.
    pub fn parse_list(text: &str) -> Option<Vec<Address>> {
        split_list(text)
            .into_iter()
            .filter(|member| !member.trim().is_empty())
            .map(Address::parse)
            .collect()
    }

    /// The display name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The `local@domain` part.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if name.contains(|c: char| ",;:<>@()\"".contains(c)) => write!(
                f,
                "\"{}\" <{}>",
                name.replace('\\', "\\\\").replace('"', "\\\""),
                self.address
            ),
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => f.write_str(&self.address),
        }
    }
}

fn display_name(text: &str) -> Option<String> {
    let text = text.trim();
    let text = match text.strip_prefix('"') {
        Some(rest) => rest.strip_suffix('"').unwrap_or(rest),
        None => text,
    };
    let mut name = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => name.extend(chars.next()),
            c => name.push(c),
        }
    }
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Split on commas and group delimiters outside quotes, angle brackets and comments.
///
/// A group label (`team:`) is dropped along with its colon, and the `;` closing a group acts
/// as a separator.
fn split_list(text: &str) -> Vec<&str> {
    let mut members = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    let mut angle = false;
    let mut comment = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted || comment > 0 => escaped = true,
            '"' if comment == 0 => quoted = !quoted,
            _ if quoted => {}
            '(' => comment += 1,
            ')' => comment = comment.saturating_sub(1),
            _ if comment > 0 => {}
            '<' => angle = true,
            '>' => angle = false,
            ':' if !angle => start = i + 1,
            ',' | ';' if !angle => {
                members.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    members.push(&text[start..]);
    members
}
