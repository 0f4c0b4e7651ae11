//! `Content-Type` resolution, including RFC 2231 extended parameters.

use std::fmt;

use super::encoded_word;
use super::header::HeaderTable;
use super::transfer::{decode_text, lookup_charset, DEFAULT_CHARSET};

/// The media type of a message or body part, with the parameters the parser cares about.
///
/// A `multipart/*` descriptor always carries a non-empty boundary: a multipart declaration
/// without one is downgraded to `application/octet-stream` when it is resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType {
    media_type: String,
    charset: Option<String>,
    boundary: Option<String>,
    name: Option<String>,
}

impl ContentType {
    /// `text/plain`, the type of anything that does not declare one.
    pub fn text_plain(boundary: Option<&str>) -> Self {
        ContentType {
            media_type: "text/plain".to_string(),
            charset: None,
            boundary: boundary.map(str::to_string),
            name: None,
        }
    }

    /// Parse the value of a `Content-Type` header on its own.
    pub fn parse(value: &str) -> Self {
        let mut content_type = Self::parse_unchecked(value);
        content_type.normalize();
        content_type
    }

    fn parse_unchecked(value: &str) -> Self {
        let mut items = split_unquoted(value, ';').into_iter();
        let media_type = items
            .next()
            .map(|t| t.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let params = parameters(items);
        let media_type = match media_type.split_once('/') {
            Some((kind, subtype)) if !kind.trim().is_empty() && !subtype.trim().is_empty() => {
                media_type
            }
            _ => "text/plain".to_string(),
        };

        ContentType {
            media_type,
            charset: lookup(&params, "charset").filter(|c| !c.is_empty()),
            boundary: lookup(&params, "boundary").filter(|b| !b.is_empty()),
            name: lookup(&params, "name").filter(|n| !n.is_empty()),
        }
    }

    /// Resolve the descriptor of a header block.
    ///
    /// `boundary` is the delimiter of the enclosing multipart, and takes precedence over the
    /// block's own `boundary` parameter. Within a multipart, a part without a `name` parameter
    /// takes the `filename` of its `Content-Disposition`.
    pub fn resolve(headers: &HeaderTable, boundary: Option<&str>) -> Self {
        let mut content_type = match headers.get("Content-Type") {
            Some(value) => Self::parse_unchecked(value),
            None => Self::text_plain(None),
        };
        if let Some(boundary) = boundary {
            content_type.boundary = Some(boundary.to_string());
        }
        if content_type.name.is_none() && content_type.boundary.is_some() {
            content_type.name = headers
                .get("Content-Disposition")
                .and_then(|d| parameter(d, "filename"))
                .filter(|n| !n.is_empty());
        }
        content_type.normalize();
        content_type
    }

    fn normalize(&mut self) {
        if self.is_multipart() && self.boundary.is_none() {
            log::debug!("{} without a boundary, treating as binary", self.media_type);
            self.media_type = "application/octet-stream".to_string();
        }
    }

    /// The lower-cased `type/subtype`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// The declared charset, or [`DEFAULT_CHARSET`].
    pub fn charset(&self) -> &str {
        self.charset.as_deref().unwrap_or(DEFAULT_CHARSET)
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// The file name suggested for this part, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }

    /// Whether this is `text/plain` or `text/html`, the two types rendered as a body.
    pub fn is_text_body(&self) -> bool {
        self.media_type == "text/plain" || self.is_html()
    }

    pub fn is_html(&self) -> bool {
        self.media_type == "text/html"
    }

    /// Whether this is `multipart/appledouble`, a resource fork followed by a data fork.
    pub fn is_apple_double(&self) -> bool {
        self.media_type == "multipart/appledouble"
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.media_type)?;
        if let Some(charset) = &self.charset {
            write!(f, "; charset={}", charset)?;
        }
        if let Some(name) = &self.name {
            write!(f, "; name=\"{}\"", name.replace('"', "\\\""))?;
        }
        Ok(())
    }
}

/// Split on `separator` wherever it is not inside a quoted string.
fn split_unquoted(value: &str, separator: char) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == separator && !quoted => {
                items.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    items.push(&value[start..]);
    items
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let inner = match value.strip_prefix('"') {
        Some(rest) => rest.strip_suffix('"').unwrap_or(rest),
        None => return value.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

// Parameter names are lower-cased; values are unquoted but otherwise raw.
fn parameters<'a>(items: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    items
        .filter_map(|item| {
            let (key, value) = item.split_once('=')?;
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                return None;
            }
            Some((key, unquote(value)))
        })
        .collect()
}

/// The value of parameter `key` within a header value such as `attachment; filename="a.txt"`.
pub(crate) fn parameter(value: &str, key: &str) -> Option<String> {
    let items = split_unquoted(value, ';');
    let params = parameters(items.into_iter().skip(1));
    lookup(&params, key)
}

fn lookup(params: &[(String, String)], key: &str) -> Option<String> {
    if let Some((_, value)) = params.iter().find(|(k, _)| k == key) {
        return Some(encoded_word::decode(value).into_owned());
    }

    let extended = format!("{}*", key);
    if let Some((_, value)) = params.iter().find(|(k, _)| *k == extended) {
        return Some(decode_extended(value));
    }

    // RFC 2231 continuations: key*0, key*1*, ...
    let mut segments: Vec<(u32, bool, &str)> = params
        .iter()
        .filter_map(|(k, v)| {
            let rest = k.strip_prefix(&extended)?;
            let (index, encoded) = match rest.strip_suffix('*') {
                Some(index) => (index, true),
                None => (rest, false),
            };
            Some((index.parse().ok()?, encoded, v.as_str()))
        })
        .collect();
    if segments.is_empty() {
        return None;
    }
    segments.sort_by_key(|(index, _, _)| *index);

    let mut charset = "us-ascii";
    let mut bytes = Vec::new();
    for (index, encoded, value) in segments {
        if !encoded {
            bytes.extend_from_slice(value.as_bytes());
            continue;
        }
        let pieces: Vec<&str> = value.splitn(3, '\'').collect();
        let value = match (index, pieces.as_slice()) {
            (0, &[declared, _language, text]) => {
                charset = declared;
                text
            }
            _ => value,
        };
        percent_decode_into(value, &mut bytes);
    }
    Some(decode_text(&bytes, lookup_charset(charset)))
}

/// `charset'language'percent-encoded-text`
fn decode_extended(value: &str) -> String {
    let pieces: Vec<&str> = value.splitn(3, '\'').collect();
    let (charset, text) = match pieces.as_slice() {
        &[charset, _language, text] => (charset, text),
        _ => ("us-ascii", value),
    };
    let mut bytes = Vec::with_capacity(text.len());
    percent_decode_into(text, &mut bytes);
    decode_text(&bytes, lookup_charset(charset))
}

fn percent_decode_into(text: &str, out: &mut Vec<u8>) {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            if let Ok(b) = u8::from_str_radix(&text[i + 1..i + 3], 16) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(lines: &[(&str, &str)]) -> HeaderTable {
        let mut table = HeaderTable::default();
        for (name, value) in lines {
            table.push(name, value.to_string());
        }
        table
    }

    #[test]
    fn plain_parameters() {
        let ct = ContentType::parse(r#"Text/HTML; charset="UTF-8"; name=page.html"#);
        assert_eq!(ct.media_type(), "text/html");
        assert_eq!(ct.charset(), "UTF-8");
        assert_eq!(ct.name(), Some("page.html"));
        assert!(ct.is_html());
        assert!(ct.is_text_body());
    }

    #[test]
    fn quoted_separator() {
        let ct = ContentType::parse(r#"multipart/mixed; boundary="a;b=c"; charset=us-ascii"#);
        assert_eq!(ct.boundary(), Some("a;b=c"));
        assert_eq!(ct.charset(), "us-ascii");
        assert!(ct.is_multipart());
    }

    #[test]
    fn defaults() {
        let ct = ContentType::resolve(&HeaderTable::default(), None);
        assert_eq!(ct.media_type(), "text/plain");
        assert_eq!(ct.charset(), DEFAULT_CHARSET);
        assert_eq!(ContentType::parse("garbage").media_type(), "text/plain");
        assert_eq!(ContentType::parse("").media_type(), "text/plain");
    }

    #[test]
    fn multipart_without_boundary() {
        let ct = ContentType::parse("multipart/mixed");
        assert_eq!(ct.media_type(), "application/octet-stream");
        assert!(!ct.is_multipart());
        assert_eq!(ContentType::parse("multipart/mixed; boundary=\"\"").boundary(), None);
    }

    #[test]
    fn enclosing_boundary_overrides() {
        let h = headers(&[("Content-Type", "multipart/related; boundary=inner")]);
        let ct = ContentType::resolve(&h, Some("outer"));
        assert_eq!(ct.boundary(), Some("outer"));
        assert_eq!(ContentType::resolve(&h, None).boundary(), Some("inner"));
    }

    #[test]
    fn disposition_filename_within_multipart() {
        let h = headers(&[
            ("Content-Type", "application/pdf"),
            ("Content-Disposition", r#"attachment; filename="report.pdf""#),
        ]);
        assert_eq!(ContentType::resolve(&h, Some("B")).name(), Some("report.pdf"));
        assert_eq!(ContentType::resolve(&h, None).name(), None);
    }

    #[test]
    fn encoded_word_name() {
        let ct = ContentType::parse(r#"application/pdf; name="=?UTF-8?B?SGVsbG8=?=.pdf""#);
        assert_eq!(ct.name(), Some("Hello.pdf"));
    }

    #[test]
    fn rfc2231_extended() {
        let ct = ContentType::parse("application/pdf; name*=utf-8''caf%C3%A9.pdf");
        assert_eq!(ct.name(), Some("café.pdf"));
    }

    #[test]
    fn rfc2231_continuations() {
        let value = "attachment; filename*0*=iso-8859-1'en'caf%E9; filename*1=\"-menu\"; \
                     filename*2*=.txt";
        assert_eq!(parameter(value, "filename").as_deref(), Some("café-menu.txt"));
    }

    #[test]
    fn missing_parameter() {
        assert_eq!(parameter("inline", "filename"), None);
        assert_eq!(parameter("attachment; size=12", "filename"), None);
    }

    #[test]
    fn display() {
        let ct = ContentType::parse("text/plain; charset=utf-8; name=a.txt");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8; name=\"a.txt\"");
    }
}
