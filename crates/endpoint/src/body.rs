use crate::error_value::ErrorValue;
use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The error type shared by handlers and streaming bodies.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A body stream handed over by a handler.
///
/// It is consumed at most once: either forwarded into the [`ResponseBody`], or dropped
/// (which aborts the producer) when the response must not carry a body.
pub struct BodyStream {
    inner: UnsyncBoxBody<Bytes, BoxError>,
}

impl BodyStream {
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: body.map_err(Into::into).boxed_unsync() }
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream").field("size_hint", &self.inner.size_hint()).finish()
    }
}

/// The body a handler returns, classified once when the handler result is built.
#[derive(Debug)]
pub enum BodyValue {
    Text(String),
    Binary(Bytes),
    Stream(BodyStream),
    Json(Value),
    Error(ErrorValue),
}

impl BodyValue {
    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self::Stream(BodyStream::new(body))
    }

    /// A short name of the body shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            BodyValue::Text(_) => "string",
            BodyValue::Binary(_) => "binary",
            BodyValue::Stream(_) => "stream",
            BodyValue::Json(_) => "json",
            BodyValue::Error(_) => "error",
        }
    }

    /// Returns true for the shapes the engine serializes itself.
    pub fn is_json_like(&self) -> bool {
        matches!(self, BodyValue::Json(_) | BodyValue::Error(_))
    }
}

/// An empty JSON object, the body of a result that doesn't set one.
impl Default for BodyValue {
    fn default() -> Self {
        BodyValue::Json(Value::Object(serde_json::Map::new()))
    }
}

impl From<String> for BodyValue {
    fn from(value: String) -> Self {
        BodyValue::Text(value)
    }
}

impl From<&str> for BodyValue {
    fn from(value: &str) -> Self {
        BodyValue::Text(value.to_string())
    }
}

impl From<Bytes> for BodyValue {
    fn from(value: Bytes) -> Self {
        BodyValue::Binary(value)
    }
}

impl From<Vec<u8>> for BodyValue {
    fn from(value: Vec<u8>) -> Self {
        BodyValue::Binary(Bytes::from(value))
    }
}

impl From<Value> for BodyValue {
    fn from(value: Value) -> Self {
        BodyValue::Json(value)
    }
}

impl From<ErrorValue> for BodyValue {
    fn from(value: ErrorValue) -> Self {
        BodyValue::Error(value)
    }
}

impl From<BodyStream> for BodyValue {
    fn from(value: BodyStream) -> Self {
        BodyValue::Stream(value)
    }
}

/// The body of a normalized response.
///
/// Either a single buffered chunk, absent, or a stream forwarded as is.
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(UnsyncBoxBody<Bytes, BoxError>),
}

impl ResponseBody {
    /// An absent body.
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        Self { inner: Kind::Once(Some(bytes)) }
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self::from(BodyStream::new(body))
    }

    /// Returns true when there is no body to send (or the single chunk was already taken).
    pub fn is_absent(&self) -> bool {
        matches!(self.inner, Kind::Once(None))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.inner, Kind::Stream(_))
    }

    /// The buffered bytes, if this is a single chunk body.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.inner {
            Kind::Once(bytes) => bytes.as_ref(),
            Kind::Stream(_) => None,
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Kind::Once(bytes) => f.debug_tuple("Once").field(bytes).finish(),
            Kind::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<BodyStream> for ResponseBody {
    fn from(stream: BodyStream) -> Self {
        Self { inner: Kind::Stream(stream.inner) }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        ResponseBody { inner: Kind::Once(Some(Bytes::from(value))) }
    }
}

impl From<()> for ResponseBody {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl From<Option<Bytes>> for ResponseBody {
    fn from(option: Option<Bytes>) -> Self {
        match option {
            Some(bytes) => Self::once(bytes),
            None => Self::empty(),
        }
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let kind = &mut self.get_mut().inner;
        match kind {
            Kind::Once(option_bytes) => Poll::Ready(option_bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Stream(box_body) => {
                let pin = Pin::new(box_body);
                pin.poll_frame(cx)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        let kind = &self.inner;
        match kind {
            Kind::Once(option_bytes) => option_bytes.is_none(),
            Kind::Stream(box_body) => box_body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        let kind = &self.inner;
        match kind {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream(box_body) => box_body.size_hint(),
        }
    }
}
