use std::collections::HashMap;

/// Extension used for media types the map does not know.
pub const DEFAULT_EXTENSION: &str = "bin";

const STANDARD: &[(&str, &str)] = &[
    ("application/gzip", "gz"),
    ("application/json", "json"),
    ("application/ms-tnef", "dat"),
    ("application/msword", "doc"),
    ("application/octet-stream", "bin"),
    ("application/pdf", "pdf"),
    ("application/pkcs7-signature", "p7s"),
    ("application/postscript", "ps"),
    ("application/rtf", "rtf"),
    ("application/vnd.ms-excel", "xls"),
    ("application/vnd.ms-powerpoint", "ppt"),
    ("application/vnd.oasis.opendocument.text", "odt"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    ("application/x-gzip", "gz"),
    ("application/x-pkcs7-signature", "p7s"),
    ("application/x-tar", "tar"),
    ("application/x-zip-compressed", "zip"),
    ("application/xml", "xml"),
    ("application/zip", "zip"),
    ("audio/mpeg", "mp3"),
    ("audio/wav", "wav"),
    ("image/bmp", "bmp"),
    ("image/gif", "gif"),
    ("image/jpeg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/png", "png"),
    ("image/svg+xml", "svg"),
    ("image/tiff", "tif"),
    ("image/webp", "webp"),
    ("message/delivery-status", "txt"),
    ("message/rfc822", "eml"),
    ("text/calendar", "ics"),
    ("text/css", "css"),
    ("text/csv", "csv"),
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("text/rtf", "rtf"),
    ("text/xml", "xml"),
    ("video/mp4", "mp4"),
    ("video/mpeg", "mpg"),
];

/// File extensions by media type, used to name extracted parts.
///
/// Build it once and share it by reference.
#[derive(Clone, Debug)]
pub struct ExtensionMap {
    by_type: HashMap<String, String>,
}

impl ExtensionMap {
    /// The built-in table.
    pub fn standard() -> Self {
        ExtensionMap {
            by_type: STANDARD
                .iter()
                .map(|(t, e)| (t.to_string(), e.to_string()))
                .collect(),
        }
    }

    /// Add or replace the extension for `media_type`.
    pub fn insert(&mut self, media_type: &str, extension: &str) -> &mut Self {
        self.by_type
            .insert(media_type.to_ascii_lowercase(), extension.to_string());
        self
    }

    /// The extension for `media_type`, without a dot. Unknown types get [`DEFAULT_EXTENSION`].
    pub fn extension(&self, media_type: &str) -> &str {
        self.by_type
            .get(&media_type.to_ascii_lowercase())
            .map_or(DEFAULT_EXTENSION, String::as_str)
    }
}

impl Default for ExtensionMap {
    fn default() -> Self {
        Self::standard()
    }
}
