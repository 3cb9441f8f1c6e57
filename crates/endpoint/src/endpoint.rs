//! Method dispatch for one resolved endpoint.
//!
//! An [`Endpoint`] holds at most one handler per method of [`EndpointMethod`]. Dispatching
//! picks the handler for the request method (`HEAD` is served by `GET`), invokes it and
//! normalizes its output. Requests without a matching handler get `405 Method Not Allowed`
//! with an `allow` header, or `204 No Content` for internal data requests.

use crate::body::ResponseBody;
use crate::conditional::not_modified;
use crate::error::EndpointError;
use crate::handler::EndpointHandler;
use crate::normalize::{normalize, text_response};
use crate::options::EndpointOptions;
use crate::request::RequestContext;
use http::header::ALLOW;
use http::{HeaderValue, Method, Response, StatusCode};
use std::fmt;
use tracing::{debug, warn};

const METHOD_COUNT: usize = 5;

/// The methods an endpoint can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl EndpointMethod {
    /// All methods, in the order they are listed in an `allow` header.
    pub const ALL: [EndpointMethod; METHOD_COUNT] =
        [EndpointMethod::Get, EndpointMethod::Post, EndpointMethod::Put, EndpointMethod::Patch, EndpointMethod::Delete];

    /// Maps a request method onto an endpoint method; any other method has no handler.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(EndpointMethod::Get),
            Method::POST => Some(EndpointMethod::Post),
            Method::PUT => Some(EndpointMethod::Put),
            Method::PATCH => Some(EndpointMethod::Patch),
            Method::DELETE => Some(EndpointMethod::Delete),
            _ => None,
        }
    }

    pub fn as_method(self) -> Method {
        match self {
            EndpointMethod::Get => Method::GET,
            EndpointMethod::Post => Method::POST,
            EndpointMethod::Put => Method::PUT,
            EndpointMethod::Patch => Method::PATCH,
            EndpointMethod::Delete => Method::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointMethod::Get => "GET",
            EndpointMethod::Post => "POST",
            EndpointMethod::Put => "PUT",
            EndpointMethod::Patch => "PATCH",
            EndpointMethod::Delete => "DELETE",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EndpointMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The handlers of one route, keyed by method.
///
/// Built once with [`Endpoint::builder`], immutable afterwards and safe to share between
/// concurrent requests.
pub struct Endpoint {
    handlers: [Option<Box<dyn EndpointHandler>>; METHOD_COUNT],
}

impl Endpoint {
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    /// Gets the handler registered for `method`
    pub fn handler(&self, method: EndpointMethod) -> Option<&dyn EndpointHandler> {
        self.handlers[method.index()].as_deref()
    }

    #[inline]
    pub fn has(&self, method: EndpointMethod) -> bool {
        self.handlers[method.index()].is_some()
    }

    /// The methods this endpoint answers: the registered ones, then `HEAD` when `GET` is registered.
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut allowed: Vec<Method> =
            EndpointMethod::ALL.into_iter().filter(|method| self.has(*method)).map(EndpointMethod::as_method).collect();
        if self.has(EndpointMethod::Get) {
            allowed.push(Method::HEAD);
        }
        allowed
    }

    /// Dispatches the request to its handler and normalizes the handler's output.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler fails, or if it returned the unsupported fallthrough signal.
    pub async fn dispatch(
        &self,
        req: &RequestContext,
        options: &EndpointOptions,
    ) -> Result<Response<ResponseBody>, EndpointError> {
        let method = req.method();
        let Some(handler) = self.resolve(method) else {
            return Ok(self.method_not_allowed(req));
        };

        debug!(%method, route = %req.uri().path(), "invoking endpoint handler");
        let output = handler.invoke(req).await.map_err(EndpointError::handler)?;
        let response = normalize(method, req.uri(), output, options)?;

        if *method == Method::GET || *method == Method::HEAD {
            Ok(not_modified(req.headers(), response))
        } else {
            Ok(response)
        }
    }

    fn resolve(&self, method: &Method) -> Option<&dyn EndpointHandler> {
        if let Some(handler) = EndpointMethod::from_method(method).and_then(|method| self.handler(method)) {
            return Some(handler);
        }

        if *method == Method::HEAD {
            debug!("no HEAD handler, falling back to GET");
            return self.handler(EndpointMethod::Get);
        }

        None
    }

    fn method_not_allowed(&self, req: &RequestContext) -> Response<ResponseBody> {
        let method = req.method();
        if req.is_data_request() {
            debug!(%method, route = %req.uri().path(), "no handler for data request");
            let mut response = Response::new(ResponseBody::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            return response;
        }

        let allow = self.allowed_methods().iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        warn!(%method, route = %req.uri().path(), allow = %allow, "method not allowed");

        let mut response = text_response(method, StatusCode::METHOD_NOT_ALLOWED, format!("{method} method not allowed"));
        if let Ok(value) = HeaderValue::try_from(allow) {
            response.headers_mut().insert(ALLOW, value);
        }
        response
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods = EndpointMethod::ALL.into_iter().filter(|method| self.has(*method)).collect::<Vec<_>>();
        f.debug_struct("Endpoint").field("methods", &methods).finish()
    }
}

pub struct EndpointBuilder {
    handlers: [Option<Box<dyn EndpointHandler>>; METHOD_COUNT],
}

impl EndpointBuilder {
    fn new() -> Self {
        Self { handlers: Default::default() }
    }

    /// Registers `handler` for `method`, replacing any handler registered before.
    pub fn handler<H: EndpointHandler + 'static>(mut self, method: EndpointMethod, handler: H) -> Self {
        let slot = &mut self.handlers[method.index()];
        if slot.is_some() {
            warn!(%method, "replacing already registered handler");
        }
        *slot = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Endpoint {
        Endpoint { handlers: self.handlers }
    }
}

impl fmt::Debug for EndpointBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.handlers.iter().filter(|handler| handler.is_some()).count();
        f.debug_struct("EndpointBuilder").field("handlers", &count).finish()
    }
}

macro_rules! method_handler {
    ($method:ident, $variant:ident) => {
        #[doc = concat!("Registers the handler of `", stringify!($variant), "` requests.")]
        pub fn $method<H: EndpointHandler + 'static>(self, handler: H) -> Self {
            self.handler(EndpointMethod::$variant, handler)
        }
    };
}

impl EndpointBuilder {
    method_handler!(get, Get);
    method_handler!(post, Post);
    method_handler!(put, Put);
    method_handler!(patch, Patch);
    method_handler!(delete, Delete);
}
