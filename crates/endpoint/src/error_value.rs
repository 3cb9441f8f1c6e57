//! Error values returned as response bodies, and their JSON serialization.

use serde_json::{Map, Value};
use std::any::type_name;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

const DEFAULT_NAME: &str = "Error";
const RESERVED_KEYS: [&str; 4] = ["name", "message", "stack", "cause"];

/// An error carried as a response body.
///
/// Handlers return it through [`BodyValue::Error`](crate::BodyValue::Error); the normalizer
/// turns it into a JSON object with [`serialize_error`].
#[derive(Debug, Clone)]
pub struct ErrorValue {
    name: String,
    message: String,
    backtrace: Option<String>,
    fields: Map<String, Value>,
    cause: Option<Box<ErrorValue>>,
}

impl ErrorValue {
    /// Creates an error value named `Error` with the given message.
    ///
    /// A backtrace is captured when the environment enables it (`RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            message: message.into(),
            backtrace: capture_backtrace(),
            fields: Map::new(),
            cause: None,
        }
    }

    /// Builds an error value from any error, following its `source()` chain into nested causes.
    ///
    /// The name is the unqualified type name of `E`.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let mut value = Self::from_dyn(error);
        value.name = short_type_name::<E>().to_string();
        value
    }

    /// Builds an error value from a type erased error, e.g. a handler's boxed error.
    pub fn from_dyn(error: &(dyn Error + 'static)) -> Self {
        let mut value = Self::new(error.to_string());
        value.cause = error.source().map(|source| Box::new(Self::from_dyn(source)));
        value
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attaches an extra field that is serialized next to `name` and `message`.
    ///
    /// Reserved keys (`name`, `message`, `stack`, `cause`) are ignored.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn with_cause(mut self, cause: ErrorValue) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&ErrorValue> {
        self.cause.as_deref()
    }

    /// The trace text: a `name: message` line followed by the captured backtrace, if any.
    pub fn stack(&self) -> String {
        match &self.backtrace {
            Some(backtrace) => format!("{self}\n{backtrace}"),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Converts an error value into a JSON object: `{ "name", "message", ..fields, "cause"? }`.
///
/// The `stack` field is only emitted when `include_stack` is set; production settings keep it off.
///
/// # Example
/// ```
/// use micro_endpoint::{serialize_error, ErrorValue};
/// use serde_json::json;
///
/// let error = ErrorValue::new("boom").with_field("code", 42);
/// assert_eq!(serialize_error(&error, false), json!({"name": "Error", "message": "boom", "code": 42}));
/// ```
pub fn serialize_error(error: &ErrorValue, include_stack: bool) -> Value {
    let mut object = Map::with_capacity(error.fields.len() + 4);
    object.insert("name".to_string(), Value::String(error.name.clone()));
    object.insert("message".to_string(), Value::String(error.message.clone()));
    if include_stack {
        object.insert("stack".to_string(), Value::String(error.stack()));
    }

    for (key, value) in &error.fields {
        object.insert(key.clone(), value.clone());
    }

    if let Some(cause) = &error.cause {
        object.insert("cause".to_string(), serialize_error(cause, include_stack));
    }

    Value::Object(object)
}

fn capture_backtrace() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}
