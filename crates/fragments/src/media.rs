//! MediaType: parsed Content-Type values and the fragment type registry.
//!
//! A fragment's `type` is a full Content-Type value that may carry parameters
//! (`text/plain; charset=utf-8`). Everything that decides support or
//! convertibility works on the essence (`text/plain`) only.

use std::fmt;
use std::str::FromStr;

use mime::Mime;

use crate::error::{FragmentError, Result};

/// The fixed set of base types a fragment may be stored as.
pub const SUPPORTED_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/html",
    "application/json",
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
];

const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

/// A parsed Content-Type value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType(Mime);

impl MediaType {
    /// Parse a Content-Type value such as `text/html; charset=utf-8`.
    ///
    /// Type and subtype compare case-insensitively.
    pub fn parse(value: &str) -> Result<Self> {
        value
            .trim()
            .parse::<Mime>()
            .map(Self)
            .map_err(|e| FragmentError::Validation(format!("invalid media type {value:?}: {e}")))
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> &str {
        self.0.essence_str()
    }

    /// Look up a parameter by (case-insensitive) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.0
            .params()
            .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.0.get_param(mime::CHARSET).map(|value| value.as_str())
    }

    pub fn is_text(&self) -> bool {
        self.0.type_() == mime::TEXT
    }

    pub fn is_image(&self) -> bool {
        IMAGE_TYPES.contains(&self.essence())
    }
}

impl FromStr for MediaType {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// True if `value` parses and its essence is in [`SUPPORTED_TYPES`].
pub fn is_supported_type(value: &str) -> bool {
    MediaType::parse(value)
        .map(|media| SUPPORTED_TYPES.contains(&media.essence()))
        .unwrap_or(false)
}

/// The essences a fragment of type `essence` may be rendered as.
pub fn formats(essence: &str) -> &'static [&'static str] {
    match essence {
        "text/plain" => &["text/plain"],
        "text/markdown" => &["text/plain", "text/markdown", "text/html"],
        "text/html" => &["text/plain", "text/html"],
        "application/json" => &["text/plain", "application/json"],
        "image/png" | "image/jpeg" | "image/webp" | "image/gif" => IMAGE_TYPES,
        _ => &[],
    }
}

/// Map a URL extension (`html`, `txt`, `jpg`, ...) to the essence it requests.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "html" => Some("text/html"),
        "json" => Some("application/json"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
