//! Conditional request handling.
//!
//! A client that already holds the current representation revalidates it with
//! `If-None-Match`; when the validator still matches it gets `304 Not Modified`
//! without a body.

use crate::body::ResponseBody;
use http::header::{CACHE_CONTROL, CONTENT_LOCATION, DATE, ETAG, EXPIRES, IF_NONE_MATCH, VARY};
use http::{HeaderMap, HeaderName, Response, StatusCode};
use tracing::debug;

/// Headers a `304` response keeps from the response it replaces.
const KEPT_HEADERS: [HeaderName; 6] = [ETAG, CACHE_CONTROL, CONTENT_LOCATION, DATE, EXPIRES, VARY];

/// Replaces a `200` response by `304 Not Modified` when `If-None-Match` matches its `etag`.
///
/// Any other response is returned unchanged.
pub fn not_modified(request_headers: &HeaderMap, response: Response<ResponseBody>) -> Response<ResponseBody> {
    if response.status() != StatusCode::OK {
        return response;
    }

    let Some(etag) = response.headers().get(ETAG).and_then(|value| value.to_str().ok()) else {
        return response;
    };

    let matched = request_headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|if_none_match| etag_matches(if_none_match, etag));
    if !matched {
        return response;
    }

    debug!(etag, "validator matched, answering 304");
    let (mut parts, _body) = response.into_parts();
    let mut headers = HeaderMap::with_capacity(KEPT_HEADERS.len());
    for name in KEPT_HEADERS {
        for value in parts.headers.get_all(&name) {
            headers.append(name.clone(), value.clone());
        }
    }
    parts.status = StatusCode::NOT_MODIFIED;
    parts.headers = headers;
    Response::from_parts(parts, ResponseBody::empty())
}

/// Weak comparison of an `If-None-Match` value against an entity tag.
///
/// Supports a single tag, a comma separated list and the `*` wildcard.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let etag = opaque_tag(etag);
    if_none_match.split(',').map(str::trim).any(|candidate| candidate == "*" || opaque_tag(candidate) == etag)
}

fn opaque_tag(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
