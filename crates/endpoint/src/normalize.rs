//! Response normalization: turns whatever a handler returned into a protocol-correct response.
//!
//! The steps run in a fixed order:
//!
//! 1. the handler output must be object-shaped, otherwise a diagnostic `500` is produced
//! 2. the legacy fallthrough signal is rejected with [`EndpointError::UnsupportedFallthrough`]
//! 3. status, headers and body are extracted (`200`, no headers and `{}` by default)
//! 4. the first `content-type` value becomes the only active one
//! 5. the body is validated against that content-type, a mismatch produces a diagnostic `500`
//! 6. JSON-like bodies are encoded, everything else is passed through
//! 7. buffered bodies get a quoted `etag`, unless one is set or `cache-control` forbids it
//! 8. the body is dropped for `HEAD` requests and for the statuses 101, 204, 205 and 304

use crate::body::{BodyStream, BodyValue, ResponseBody};
use crate::content_type::content_type_of;
use crate::error::EndpointError;
use crate::error_value::serialize_error;
use crate::etag;
use crate::options::EndpointOptions;
use crate::result::HandlerOutput;
use crate::validate::validate_body;
use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG};
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, Uri};
use std::borrow::Cow;
use std::fmt::Display;
use tracing::{debug, error};

/// Statuses whose responses never carry a body.
pub const BODYLESS_STATUS: [StatusCode; 4] = [
    StatusCode::SWITCHING_PROTOCOLS,
    StatusCode::NO_CONTENT,
    StatusCode::RESET_CONTENT,
    StatusCode::NOT_MODIFIED,
];

const JSON_UTF_8: HeaderValue = HeaderValue::from_static("application/json; charset=utf-8");
const TEXT_PLAIN_UTF_8: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const OCTET_STREAM: HeaderValue = HeaderValue::from_static("application/octet-stream");

const JSON_PREFIX: &str = "application/json";
const UNCACHEABLE_DIRECTIVES: [&str; 2] = ["no-store", "immutable"];

/// A body after encoding: buffered bytes, or a stream forwarded untouched.
enum Encoded {
    Bytes(Bytes),
    Stream(BodyStream),
}

/// Normalizes the output of the handler that answered `method` on `uri`.
///
/// Shape problems are answered with a plain text `500` response naming the route and the
/// problem; only the fallthrough signal is returned as an error.
pub fn normalize(
    method: &Method,
    uri: &Uri,
    output: HandlerOutput,
    options: &EndpointOptions,
) -> Result<Response<ResponseBody>, EndpointError> {
    let result = match output.into_result() {
        Ok(result) => result,
        Err(invalid) => return Ok(diagnostic(method, uri, invalid)),
    };

    if result.is_fallthrough() {
        error!(route = %uri.path(), "handler returned the unsupported fallthrough signal");
        return Err(EndpointError::unsupported_fallthrough(uri.path()));
    }

    let (status, mut headers, body) = match result.into_parts() {
        Ok(parts) => parts,
        Err(invalid) => return Ok(diagnostic(method, uri, invalid)),
    };

    single_content_type(&mut headers);
    let content_type = content_type_of(&headers).map(Cow::into_owned);

    if let Err(e) = validate_body(&body, content_type.as_deref()) {
        return Ok(diagnostic(method, uri, e));
    }

    let encoded = match encode_body(body, content_type.as_deref(), &mut headers, options) {
        Ok(encoded) => encoded,
        Err(e) => return Ok(diagnostic(method, uri, format_args!("failed to serialize body: {e}"))),
    };

    if let Encoded::Bytes(bytes) = &encoded
        && !headers.contains_key(ETAG)
        && is_cacheable(&headers)
    {
        headers.insert(ETAG, etag::header_value(bytes));
    }

    Ok(respond(method, status, headers, encoded))
}

/// Returns true when a response with this status must not carry a body.
#[inline]
pub fn is_bodyless(status: StatusCode) -> bool {
    BODYLESS_STATUS.contains(&status)
}

/// A plain text response, with the body dropped for `HEAD` requests.
pub(crate) fn text_response(method: &Method, status: StatusCode, text: String) -> Response<ResponseBody> {
    let mut headers = HeaderMap::with_capacity(2);
    headers.insert(CONTENT_TYPE, TEXT_PLAIN_UTF_8);
    respond(method, status, headers, Encoded::Bytes(Bytes::from(text)))
}

fn diagnostic(method: &Method, uri: &Uri, reason: impl Display) -> Response<ResponseBody> {
    let message = format!("Invalid response from route {}: {reason}", uri.path());
    error!(route = %uri.path(), "{message}");
    text_response(method, StatusCode::INTERNAL_SERVER_ERROR, message)
}

fn respond(method: &Method, status: StatusCode, headers: HeaderMap, encoded: Encoded) -> Response<ResponseBody> {
    let body = if *method == Method::HEAD || is_bodyless(status) {
        if let Encoded::Stream(_) = encoded {
            debug!(%method, status = status.as_u16(), "dropping stream body of a bodyless response");
        }
        drop(encoded);
        ResponseBody::empty()
    } else {
        match encoded {
            Encoded::Bytes(bytes) => ResponseBody::once(bytes),
            Encoded::Stream(stream) => ResponseBody::from(stream),
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn single_content_type(headers: &mut HeaderMap) {
    if headers.get_all(CONTENT_TYPE).iter().nth(1).is_some()
        && let Some(first) = headers.get(CONTENT_TYPE).cloned()
    {
        debug!(content_type = ?first, "keeping the first of several content-type values");
        headers.insert(CONTENT_TYPE, first);
    }
}

fn encode_body(
    body: BodyValue,
    content_type: Option<&str>,
    headers: &mut HeaderMap,
    options: &EndpointOptions,
) -> Result<Encoded, serde_json::Error> {
    let json = content_type.is_none_or(|content_type| content_type.starts_with(JSON_PREFIX));

    let encoded = match body {
        BodyValue::Json(value) if json => {
            headers.insert(CONTENT_TYPE, JSON_UTF_8);
            Encoded::Bytes(serde_json::to_vec(&value)?.into())
        }
        BodyValue::Error(error) if json => {
            headers.insert(CONTENT_TYPE, JSON_UTF_8);
            let value = serialize_error(&error, options.include_stack());
            Encoded::Bytes(serde_json::to_vec(&value)?.into())
        }
        // another textual content-type was declared, keep it
        BodyValue::Json(value) => Encoded::Bytes(serde_json::to_vec(&value)?.into()),
        BodyValue::Error(error) => Encoded::Bytes(error.to_string().into()),
        BodyValue::Text(text) => {
            default_content_type(headers, content_type, TEXT_PLAIN_UTF_8);
            Encoded::Bytes(text.into())
        }
        BodyValue::Binary(bytes) => {
            default_content_type(headers, content_type, OCTET_STREAM);
            Encoded::Bytes(bytes)
        }
        BodyValue::Stream(stream) => {
            default_content_type(headers, content_type, OCTET_STREAM);
            Encoded::Stream(stream)
        }
    };
    Ok(encoded)
}

fn default_content_type(headers: &mut HeaderMap, content_type: Option<&str>, default: HeaderValue) {
    if content_type.is_none() {
        headers.insert(CONTENT_TYPE, default);
    }
}

fn is_cacheable(headers: &HeaderMap) -> bool {
    headers.get_all(CACHE_CONTROL).iter().all(|value| {
        let value = String::from_utf8_lossy(value.as_bytes()).to_ascii_lowercase();
        !UNCACHEABLE_DIRECTIVES.iter().any(|directive| value.contains(directive))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_value::ErrorValue;
    use crate::result::HandlerResult;
    use http::header::SET_COOKIE;
    use http_body_util::{BodyExt, StreamBody};
    use http_body::Frame;
    use serde_json::{Value, json};
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};

    fn uri() -> Uri {
        Uri::from_static("/api/items")
    }

    fn run(method: Method, output: impl Into<HandlerOutput>) -> Response<ResponseBody> {
        normalize(&method, &uri(), output.into(), &EndpointOptions::default()).unwrap()
    }

    fn body_text(response: &Response<ResponseBody>) -> String {
        let bytes = response.body().as_bytes().cloned().unwrap_or_default();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn json_body_is_encoded() {
        let response = run(Method::GET, HandlerResult::json(json!({"a": 1})));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
        assert_eq!(body_text(&response), r#"{"a":1}"#);

        let etag = response.headers()[ETAG].to_str().unwrap();
        assert_eq!(etag, format!("\"{}\"", etag::hash(br#"{"a":1}"#)));
    }

    #[test]
    fn default_body_is_empty_object() {
        let response = run(Method::GET, HandlerResult::new());
        assert_eq!(body_text(&response), "{}");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
    }

    #[test]
    fn explicit_json_content_type_is_canonicalized() {
        let response = run(Method::GET, HandlerResult::json(json!([1, 2])).header(CONTENT_TYPE, "application/json"));
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
        assert_eq!(response.headers().get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(body_text(&response), "[1,2]");
    }

    #[test]
    fn text_body_passes_through() {
        let response = run(Method::GET, HandlerResult::text("<p>hi</p>").header(CONTENT_TYPE, "text/html"));
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");
        assert_eq!(body_text(&response), "<p>hi</p>");
        assert!(response.headers().contains_key(ETAG));
    }

    #[test]
    fn text_body_defaults_to_text_plain() {
        let response = run(Method::GET, HandlerResult::text("hello"));
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body_text(&response), "hello");
    }

    #[test]
    fn binary_body_passes_through() {
        let response = run(Method::GET, HandlerResult::binary(vec![0u8, 159, 146, 150]).header(CONTENT_TYPE, "image/png"));
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(response.body().as_bytes().unwrap().as_ref(), [0u8, 159, 146, 150]);
        assert!(response.headers().contains_key(ETAG));
    }

    #[test]
    fn binary_body_defaults_to_octet_stream() {
        let response = run(Method::GET, HandlerResult::binary(Bytes::from_static(b"raw")));
        assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
    }

    #[test]
    fn json_body_under_other_textual_content_type_keeps_it() {
        let response = run(Method::GET, HandlerResult::json(json!({"a": 1})).header(CONTENT_TYPE, "text/plain"));
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(body_text(&response), r#"{"a":1}"#);
    }

    #[test]
    fn error_body_is_serialized() {
        let error = ErrorValue::new("not allowed").with_name("AuthError").with_field("code", 403);
        let response = run(Method::POST, HandlerResult::error(error).status(403));

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
        let value: Value = serde_json::from_str(&body_text(&response)).unwrap();
        assert_eq!(value, json!({"name": "AuthError", "message": "not allowed", "code": 403}));
    }

    #[test]
    fn error_stack_follows_options() {
        let output = HandlerResult::error(ErrorValue::new("boom"));
        let response = normalize(&Method::GET, &uri(), output.into(), &EndpointOptions::development()).unwrap();

        let value: Value = serde_json::from_str(&body_text(&response)).unwrap();
        assert!(value["stack"].as_str().unwrap().starts_with("Error: boom"));
    }

    #[test]
    fn error_body_under_text_content_type_is_rendered_as_text() {
        let output = HandlerResult::error(ErrorValue::new("boom")).header(CONTENT_TYPE, "text/plain");
        let response = run(Method::GET, output);
        assert_eq!(body_text(&response), "Error: boom");
    }

    #[test]
    fn non_object_output_is_a_diagnostic() {
        let response = run(Method::GET, json!(42));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert!(!response.headers().contains_key(ETAG));
        assert_eq!(body_text(&response), "Invalid response from route /api/items: expected an object, got number");
    }

    #[test]
    fn latched_builder_error_is_a_diagnostic() {
        let response = run(Method::GET, HandlerResult::new().header("x-bad", "a\nb"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(&response).starts_with("Invalid response from route /api/items: invalid header: x-bad"));
    }

    #[test]
    fn body_type_mismatch_is_a_diagnostic() {
        let output = HandlerResult::json(json!({"a": 1})).header(CONTENT_TYPE, "application/octet-stream");
        let response = run(Method::GET, output);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_text(&response),
            "Invalid response from route /api/items: body must be a string, binary data or a stream \
             when content-type is application/octet-stream, got json"
        );
    }

    #[test]
    fn non_utf8_content_type_still_guards_the_body() {
        let content_type = HeaderValue::from_bytes(b"application/octet-stream; name=caf\xc3\xa9").unwrap();
        let output = HandlerResult::json(json!({"a": 1})).header(CONTENT_TYPE, content_type);
        let response = run(Method::GET, output);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert!(body_text(&response).contains("when content-type is application/octet-stream; name=caf"));
        assert!(body_text(&response).ends_with("got json"));
    }

    #[test]
    fn blank_content_type_counts_as_missing() {
        let response = run(Method::GET, HandlerResult::json(json!({"a": 1})).header(CONTENT_TYPE, ""));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
        assert_eq!(body_text(&response), r#"{"a":1}"#);

        let response = run(Method::GET, HandlerResult::text("hello").header(CONTENT_TYPE, " "));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body_text(&response), "hello");
    }

    #[test]
    fn fallthrough_is_fatal() {
        let output = HandlerResult::new().fallthrough();
        let error = normalize(&Method::GET, &uri(), output.into(), &EndpointOptions::default()).unwrap_err();
        assert!(matches!(error, EndpointError::UnsupportedFallthrough { ref route } if route == "/api/items"));

        let error = normalize(&Method::GET, &uri(), json!({"fallthrough": true}).into(), &EndpointOptions::default())
            .unwrap_err();
        assert!(error.is_configuration_error());
    }

    #[test]
    fn etag_is_not_overwritten() {
        let response = run(Method::GET, HandlerResult::json(json!({"a": 1})).header(ETAG, "\"custom\""));
        assert_eq!(response.headers()[ETAG], "\"custom\"");
        assert_eq!(response.headers().get_all(ETAG).iter().count(), 1);
    }

    #[test]
    fn uncacheable_responses_get_no_etag() {
        for directive in ["no-store", "private, no-store", "public, max-age=31536000, immutable", "No-Store"] {
            let response = run(Method::GET, HandlerResult::json(json!({"a": 1})).header(CACHE_CONTROL, directive));
            assert!(!response.headers().contains_key(ETAG), "{directive}");
        }

        let response = run(Method::GET, HandlerResult::json(json!({"a": 1})).header(CACHE_CONTROL, "max-age=60"));
        assert!(response.headers().contains_key(ETAG));
    }

    #[test]
    fn head_drops_body_but_keeps_headers() {
        let get = run(Method::GET, HandlerResult::json(json!({"a": 1})));
        let head = run(Method::HEAD, HandlerResult::json(json!({"a": 1})));

        assert!(head.body().is_absent());
        assert_eq!(head.headers()[ETAG], get.headers()[ETAG]);
        assert_eq!(head.headers()[CONTENT_TYPE], get.headers()[CONTENT_TYPE]);
    }

    #[test]
    fn bodyless_statuses_drop_body() {
        for status in [101u16, 204, 205, 304] {
            let response = run(Method::GET, HandlerResult::text("ignored").status(status));
            assert_eq!(response.status().as_u16(), status);
            assert!(response.body().is_absent(), "{status}");
        }
    }

    #[test]
    fn diagnostics_on_head_have_no_body() {
        let response = run(Method::HEAD, json!("nope"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body().is_absent());
    }

    #[test]
    fn several_content_types_collapse_to_the_first() {
        let output = HandlerResult::text("a,b").header(CONTENT_TYPE, "text/csv").header(CONTENT_TYPE, "text/plain");
        let response = run(Method::GET, output);
        assert_eq!(response.headers().get_all(CONTENT_TYPE).iter().collect::<Vec<_>>(), ["text/csv"]);
    }

    #[test]
    fn other_headers_are_kept() {
        let output = HandlerResult::json(json!({})).header(SET_COOKIE, "a=1").header(SET_COOKIE, "b=2");
        let response = run(Method::GET, output);
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn normalization_is_deterministic() {
        let build = || HandlerResult::json(json!({"b": [1, 2, 3], "a": "x"})).header("x-trace", "1");
        let first = run(Method::GET, build());
        let second = run(Method::GET, build());

        assert_eq!(first.status(), second.status());
        assert_eq!(first.headers(), second.headers());
        assert_eq!(first.body().as_bytes(), second.body().as_bytes());
    }

    #[tokio::test]
    async fn stream_body_is_forwarded() {
        let chunks = vec![Ok::<_, Infallible>(Frame::data(Bytes::from("a"))), Ok(Frame::data(Bytes::from("b")))];
        let output = HandlerResult::stream(StreamBody::new(futures::stream::iter(chunks)))
            .header(CONTENT_TYPE, "text/event-stream");
        let response = run(Method::GET, output);

        assert!(response.body().is_stream());
        assert!(!response.headers().contains_key(ETAG));
        let collected = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from("ab"));
    }

    #[test]
    fn stream_body_is_dropped_for_head() {
        let chunks = vec![Ok::<_, Infallible>(Frame::data(Bytes::from("a")))];
        let output = HandlerResult::stream(StreamBody::new(futures::stream::iter(chunks)));
        let response = run(Method::HEAD, output);

        assert!(response.body().is_absent());
        assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
    }

    /// A producer that never yields and records when it is dropped.
    struct Producer {
        dropped: Arc<AtomicBool>,
    }

    impl http_body::Body for Producer {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Pending
        }
    }

    impl Drop for Producer {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    fn producer() -> (Producer, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (Producer { dropped: dropped.clone() }, dropped)
    }

    #[test]
    fn suppressed_stream_is_released_immediately() {
        let (body, dropped) = producer();
        let response = run(Method::HEAD, HandlerResult::stream(body));
        assert!(dropped.load(Ordering::SeqCst));
        assert!(response.body().is_absent());

        let (body, dropped) = producer();
        let response = run(Method::GET, HandlerResult::stream(body).status(204));
        assert!(dropped.load(Ordering::SeqCst));
        assert!(response.body().is_absent());
    }

    #[test]
    fn forwarded_stream_stays_alive() {
        let (body, dropped) = producer();
        let response = run(Method::GET, HandlerResult::stream(body));
        assert!(response.body().is_stream());
        assert!(!dropped.load(Ordering::SeqCst));

        drop(response);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn dynamic_output_is_normalized() {
        let response = run(Method::POST, json!({"status": 201, "headers": {"location": "/api/items/7"}, "body": {"id": 7}}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["location"], "/api/items/7");
        assert_eq!(body_text(&response), r#"{"id":7}"#);
    }
}
