use chrono::{DateTime, FixedOffset};

use super::address::Address;
use super::content_type::ContentType;
use super::header::HeaderTable;

/// Another rendering of the message body, such as the HTML half of `multipart/alternative`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlternateView {
    pub(crate) content_type: ContentType,
    pub(crate) text: String,
}

impl AlternateView {
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// The decoded text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A decoded non-text body part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub(crate) content_type: ContentType,
    pub(crate) data: Vec<u8>,
}

impl Attachment {
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// The transfer-decoded payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// One decoded body part of a multipart message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Part {
    View(AlternateView),
    Attachment(Attachment),
}

impl Part {
    pub fn content_type(&self) -> &ContentType {
        match self {
            Part::View(view) => &view.content_type,
            Part::Attachment(attachment) => &attachment.content_type,
        }
    }

    /// Treat the part as an attachment, encoding a view's text as UTF-8.
    pub fn into_attachment(self) -> Attachment {
        match self {
            Part::View(view) => Attachment {
                content_type: view.content_type,
                data: view.text.into_bytes(),
            },
            Part::Attachment(attachment) => attachment,
        }
    }
}

/// A received message, decoded.
///
/// Either `body` is set (a `text/plain` or `text/html` message), or the content is spread over
/// `alternate_views` and `attachments`; never both.
#[derive(Clone, Debug, Default)]
pub struct ParsedMessage {
    headers: HeaderTable,
    raw_headers: String,
    from: Option<Address>,
    reply_to: Option<Address>,
    to: Vec<Address>,
    cc: Vec<Address>,
    bcc: Vec<Address>,
    date: Option<DateTime<FixedOffset>>,
    pub(crate) body: Option<String>,
    pub(crate) is_html: bool,
    pub(crate) alternate_views: Vec<AlternateView>,
    pub(crate) attachments: Vec<Attachment>,
}

fn address_list(headers: &HeaderTable, name: &str) -> Vec<Address> {
    let Some(value) = headers.unfolded(name) else {
        return Vec::new();
    };
    Address::parse_list(&value).unwrap_or_else(|| {
        log::debug!("ignoring malformed {} header {:?}", name, value);
        Vec::new()
    })
}

fn single_address(headers: &HeaderTable, name: &str) -> Option<Address> {
    let value = headers.get(name)?;
    let address = Address::parse(value);
    if address.is_none() {
        log::debug!("ignoring malformed {} header {:?}", name, value);
    }
    address
}

fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    // a trailing zone comment such as `(UTC)` is common and not understood by the parser
    let value = match value.find('(') {
        Some(i) => &value[..i],
        None => value,
    };
    DateTime::parse_from_rfc2822(value.trim()).ok()
}

impl ParsedMessage {
    pub(crate) fn new(headers: HeaderTable, raw_headers: String) -> Self {
        ParsedMessage {
            from: single_address(&headers, "From"),
            reply_to: single_address(&headers, "Reply-To"),
            to: address_list(&headers, "To"),
            cc: address_list(&headers, "Cc"),
            bcc: address_list(&headers, "Bcc"),
            date: headers.get("Date").and_then(parse_date),
            headers,
            raw_headers,
            ..Default::default()
        }
    }

    /// The decoded header table.
    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    /// The header block exactly as received, before any decoding.
    pub fn raw_headers(&self) -> &str {
        &self.raw_headers
    }

    pub fn from(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    pub fn reply_to(&self) -> Option<&Address> {
        self.reply_to.as_ref()
    }

    pub fn to(&self) -> &[Address] {
        &self.to
    }

    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    pub fn subject(&self) -> Option<&str> {
        self.headers.get("Subject")
    }

    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("Message-ID")
    }

    /// The `Date` header, if present and valid RFC 2822.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.date
    }

    /// The body of a single-part text message.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Whether [`body`](Self::body) is HTML.
    pub fn is_html(&self) -> bool {
        self.is_html
    }

    pub fn alternate_views(&self) -> &[AlternateView] {
        &self.alternate_views
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}
