use std::str::FromStr;

use lazy_static::lazy_static;
use nom::bytes::complete::take_till1;
use nom::character::complete::{digit1, space0, space1};
use nom::combinator::{map_res, rest};
use nom::sequence::{preceded, separated_pair};
use nom::IResult;
use regex::Regex;

use super::types::{MessageSize, MessageUid};

lazy_static! {
    static ref APOP_TIMESTAMP: Regex = Regex::new(r"^\+OK\s.*(<[^<>\s]+>)\s*$").unwrap();
}

fn token(i: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_ascii_whitespace())(i)
}

fn number<N: FromStr>(i: &str) -> IResult<&str, N> {
    map_res(digit1, |s: &str| s.parse::<N>())(i)
}

/// Split a response line into its status indicator and the unparsed remainder.
///
/// Returns `None` for blank lines.
pub(crate) fn parse_status_line(line: &str) -> Option<(&str, &str)> {
    let parsed: IResult<&str, &str> = preceded(space0, token)(line);
    parsed.ok().map(|(params, status)| (status, params))
}

/// One line of a `UIDL` listing: the message number, a space, and the unique id.
pub(crate) fn parse_uid_line(line: &str) -> Option<MessageUid> {
    let parsed: IResult<&str, (u32, &str)> = separated_pair(number, space1, rest)(line.trim());
    match parsed {
        Ok((_, (number, id))) if !id.trim().is_empty() => Some(MessageUid {
            number,
            id: id.trim().to_string(),
        }),
        _ => None,
    }
}

/// One line of a `LIST` listing: the message number and its size in octets.
pub(crate) fn parse_size_line(line: &str) -> Option<MessageSize> {
    let parsed: IResult<&str, (u32, u64)> = separated_pair(number, space1, number)(line.trim());
    parsed
        .ok()
        .map(|(_, (number, size))| MessageSize { number, size })
}

/// The `<...>` token an APOP-capable server appends to its greeting.
pub(crate) fn parse_apop_timestamp(greeting: &str) -> Option<String> {
    APOP_TIMESTAMP
        .captures(greeting)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
