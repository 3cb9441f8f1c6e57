use crate::body::BoxError;
use thiserror::Error;

/// Failures that escape [`Endpoint::dispatch`](crate::Endpoint::dispatch).
///
/// Shape problems of a handler result never show up here: they are answered with a
/// diagnostic `500` response instead.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The handler asked to fall through to the next matching route, which is no longer supported.
    #[error("fallthrough is no longer supported (route {route}): use route matchers instead")]
    UnsupportedFallthrough { route: String },

    /// The handler itself failed; the error is passed on untouched.
    #[error("handler error: {source}")]
    Handler { source: BoxError },
}

impl EndpointError {
    pub fn unsupported_fallthrough<S: ToString>(route: S) -> Self {
        Self::UnsupportedFallthrough { route: route.to_string() }
    }

    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        Self::Handler { source: e.into() }
    }

    /// Returns true for errors caused by a handler written against a removed API.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::UnsupportedFallthrough { .. })
    }
}

/// A handler result that is not object-shaped, or whose status or headers can't be used.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct InvalidResponseShape {
    reason: String,
}

impl InvalidResponseShape {
    /// The handler returned something else than an object, e.g. a number.
    pub fn not_an_object<S: ToString>(actual: S) -> Self {
        Self { reason: format!("expected an object, got {}", actual.to_string()) }
    }

    pub fn invalid_status<S: ToString>(reason: S) -> Self {
        Self { reason: format!("invalid status: {}", reason.to_string()) }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self { reason: format!("invalid header: {}", reason.to_string()) }
    }

    pub fn invalid_field<S: ToString>(reason: S) -> Self {
        Self { reason: format!("invalid field: {}", reason.to_string()) }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A body that the declared content-type can't represent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("body must be a string, binary data or a stream when content-type is {content_type}, got {actual}")]
pub struct BodyTypeError {
    content_type: String,
    actual: &'static str,
}

impl BodyTypeError {
    pub fn new<S: ToString>(content_type: S, actual: &'static str) -> Self {
        Self { content_type: content_type.to_string(), actual }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn actual(&self) -> &'static str {
        self.actual
    }
}
