//! Cache validator (`ETag`) generation.
//!
//! The validator is a 32 bit djb2-xor hash of the encoded body, rendered in base 36.
//! It is not a cryptographic digest: it only has to be stable for identical content,
//! across restarts and platforms, and cheap enough to run for every response.

use http::HeaderValue;

const SEED: u32 = 5381;
const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hashes `content` into an opaque, unquoted validator string.
///
/// # Example
/// ```
/// use micro_endpoint::etag;
///
/// assert_eq!(etag::hash(b"hello"), etag::hash(b"hello"));
/// assert_ne!(etag::hash(b"hello"), etag::hash(b"world"));
/// ```
pub fn hash(content: &[u8]) -> String {
    let value = content.iter().rev().fold(SEED, |hash, byte| hash.wrapping_mul(33) ^ u32::from(*byte));
    to_base36(value)
}

/// Builds the quoted `etag` header value for `content`, e.g. `"1x2kq9"`.
pub fn header_value(content: &[u8]) -> HeaderValue {
    let quoted = format!("\"{}\"", hash(content));
    // only quotes and base 36 digits, always a visible ascii value
    HeaderValue::try_from(quoted).unwrap_or_else(|_| HeaderValue::from_static("\"\""))
}

fn to_base36(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::with_capacity(7);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    buf.into_iter().map(char::from).collect()
}
