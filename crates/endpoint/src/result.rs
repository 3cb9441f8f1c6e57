//! Handler results and their ingestion.
//!
//! A handler either returns a typed [`HandlerResult`], or a dynamic JSON value of the shape
//! `{ "status"?, "headers"?, "body"?, "fallthrough"? }`. Both end up as a [`HandlerResult`]
//! with canonical headers and a classified body before the normalizer sees them.

use crate::body::{BodyValue, BoxError};
use crate::error::InvalidResponseShape;
use crate::error_value::ErrorValue;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body::Body as HttpBody;
use serde::Deserialize;
use serde_json::{Map, Value};

/// The typed result of a handler: status, headers and body.
///
/// Defaults to `200 OK` with an empty JSON object as body. Conversion failures of the
/// builder methods are kept and reported when the result is normalized, the same way
/// [`http::response::Builder`] defers its errors.
#[derive(Debug)]
pub struct HandlerResult {
    status: StatusCode,
    headers: HeaderMap,
    body: BodyValue,
    fallthrough: bool,
    invalid: Option<InvalidResponseShape>,
}

impl Default for HandlerResult {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerResult {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BodyValue::default(),
            fallthrough: false,
            invalid: None,
        }
    }

    pub fn json(value: impl Into<Value>) -> Self {
        Self::new().body(BodyValue::Json(value.into()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new().body(BodyValue::Text(text.into()))
    }

    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Self::new().body(BodyValue::Binary(bytes.into()))
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self::new().body(BodyValue::stream(body))
    }

    pub fn error(error: ErrorValue) -> Self {
        Self::new().body(BodyValue::Error(error))
    }

    /// Sets the status, e.g. `201` or `StatusCode::CREATED`.
    pub fn status<T>(mut self, status: T) -> Self
    where
        StatusCode: TryFrom<T>,
        <StatusCode as TryFrom<T>>::Error: std::fmt::Display,
    {
        match StatusCode::try_from(status) {
            Ok(status) => self.status = status,
            Err(e) => self.latch(InvalidResponseShape::invalid_status(e)),
        }
        self
    }

    /// Appends a header; a name or value that isn't valid makes the result invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: std::fmt::Display,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: std::fmt::Display,
    {
        let name = match HeaderName::try_from(name) {
            Ok(name) => name,
            Err(e) => {
                self.latch(InvalidResponseShape::invalid_header(e));
                return self;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(e) => self.latch(InvalidResponseShape::invalid_header(format!("{name}: {e}"))),
        }
        self
    }

    /// Appends every entry of an existing header map.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut current = None;
        for (name, value) in headers {
            if let Some(name) = name {
                current = Some(name);
            }
            if let Some(name) = &current {
                self.headers.append(name.clone(), value);
            }
        }
        self
    }

    pub fn body(mut self, body: impl Into<BodyValue>) -> Self {
        self.body = body.into();
        self
    }

    /// Marks the result with the legacy fallthrough signal.
    ///
    /// Dispatching such a result fails with
    /// [`EndpointError::UnsupportedFallthrough`](crate::EndpointError::UnsupportedFallthrough).
    pub fn fallthrough(mut self) -> Self {
        self.fallthrough = true;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_value(&self) -> &BodyValue {
        &self.body
    }

    pub fn is_fallthrough(&self) -> bool {
        self.fallthrough
    }

    /// Splits the result, or returns the first conversion error a builder method ran into.
    pub fn into_parts(self) -> Result<(StatusCode, HeaderMap, BodyValue), InvalidResponseShape> {
        match self.invalid {
            Some(invalid) => Err(invalid),
            None => Ok((self.status, self.headers, self.body)),
        }
    }

    fn latch(&mut self, invalid: InvalidResponseShape) {
        if self.invalid.is_none() {
            self.invalid = Some(invalid);
        }
    }

    /// Ingests a dynamic result.
    ///
    /// `headers` values may be strings, arrays of strings, numbers or booleans. A missing
    /// `body` means an empty JSON object; a string `body` is sent as text, anything else as JSON.
    pub fn from_value(value: Value) -> Result<Self, InvalidResponseShape> {
        let object = match value {
            Value::Object(object) => object,
            other => return Err(InvalidResponseShape::not_an_object(value_kind(&other))),
        };

        let dynamic: DynamicResult =
            serde_json::from_value(Value::Object(object)).map_err(InvalidResponseShape::invalid_field)?;

        let mut result = Self::new();
        if let Some(status) = dynamic.status {
            result.status = parse_status(&status)?;
        }
        result.headers = parse_headers(dynamic.headers)?;
        result.body = match dynamic.body {
            Value::String(text) => BodyValue::Text(text),
            other => BodyValue::Json(other),
        };
        result.fallthrough = dynamic.fallthrough;
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct DynamicResult {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    headers: Map<String, Value>,
    #[serde(default = "empty_object")]
    body: Value,
    #[serde(default)]
    fallthrough: bool,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn parse_status(status: &Value) -> Result<StatusCode, InvalidResponseShape> {
    status
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| InvalidResponseShape::invalid_status(status))
}

fn parse_headers(record: Map<String, Value>) -> Result<HeaderMap, InvalidResponseShape> {
    let mut headers = HeaderMap::with_capacity(record.len());
    for (name, value) in record {
        let header_name = HeaderName::try_from(name.as_str())
            .map_err(|e| InvalidResponseShape::invalid_header(format!("{name}: {e}")))?;

        let values = match value {
            Value::Array(values) => values,
            single => vec![single],
        };
        for value in values {
            let text = match value {
                Value::String(text) => text,
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                other => {
                    return Err(InvalidResponseShape::invalid_header(format!(
                        "{name}: expected a string, got {}",
                        value_kind(&other)
                    )));
                }
            };
            let header_value = HeaderValue::try_from(text)
                .map_err(|e| InvalidResponseShape::invalid_header(format!("{name}: {e}")))?;
            headers.append(header_name.clone(), header_value);
        }
    }
    Ok(headers)
}

/// The JSON type name of a value, as reported in diagnostics.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whatever a handler handed back, before it is checked for an object shape.
#[derive(Debug)]
pub enum HandlerOutput {
    Result(HandlerResult),
    Dynamic(Value),
}

impl HandlerOutput {
    pub fn into_result(self) -> Result<HandlerResult, InvalidResponseShape> {
        match self {
            HandlerOutput::Result(result) => Ok(result),
            HandlerOutput::Dynamic(value) => HandlerResult::from_value(value),
        }
    }
}

impl From<HandlerResult> for HandlerOutput {
    fn from(result: HandlerResult) -> Self {
        HandlerOutput::Result(result)
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Dynamic(value)
    }
}

/// A handler that returns nothing produced no object.
impl From<()> for HandlerOutput {
    fn from((): ()) -> Self {
        HandlerOutput::Dynamic(Value::Null)
    }
}
