//! Content-type classification.
//!
//! Decides whether a declared `content-type` can carry a textual body, or whether the
//! body has to be handed over as raw bytes (a string, a byte buffer or a stream).

use http::HeaderMap;
use http::header::CONTENT_TYPE;
use std::borrow::Cow;

const APPLICATION_XML: &str = "application/xml";

/// Returns `true` when the given content-type describes a textual payload.
///
/// A missing or blank content-type is treated as textual: such bodies default to JSON.
///
/// # Example
/// ```
/// use micro_endpoint::is_textual;
///
/// assert!(is_textual(None));
/// assert!(is_textual(Some("text/html; charset=utf-8")));
/// assert!(is_textual(Some("image/svg+xml")));
/// assert!(!is_textual(Some("application/octet-stream")));
/// ```
pub fn is_textual(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type.filter(|content_type| !content_type.trim().is_empty()) else {
        return true;
    };

    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

    essence.starts_with("text/")
        || essence.ends_with("+xml")
        || essence == APPLICATION_XML
        || essence == mime::APPLICATION_JSON.essence_str()
        || essence == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()
        || essence == mime::MULTIPART_FORM_DATA.essence_str()
}

/// Returns the active `content-type` of a header map, or `None` when it is missing or blank.
///
/// Only the first value counts when a handler appended several of them. Bytes outside
/// visible ASCII are read lossily, so an unusual value still counts as declared.
pub(crate) fn content_type_of(headers: &HeaderMap) -> Option<Cow<'_, str>> {
    headers
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
        .filter(|content_type| !content_type.trim().is_empty())
}
