//! Request information handed to endpoint handlers.
//!
//! This module contains:
//! - `RequestContext`: method, target uri, headers and path parameters of one request
//! - `PathParams`: the parameters the routing layer extracted from the request path

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri};

/// Represents the context of one HTTP request as seen by an endpoint.
///
/// The routing layer builds it once it resolved the endpoint; the engine only reads it.
/// It owns its data so closure handlers can take it by value.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: PathParams,
    data_request: bool,
}

impl RequestContext {
    /// Creates a context without headers or path parameters
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri, headers: HeaderMap::new(), path_params: PathParams::empty(), data_request: false }
    }

    /// Creates a context from the head of an incoming request
    pub fn from_parts(parts: Parts) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            path_params: PathParams::empty(),
            data_request: false,
        }
    }

    /// Creates a context by copying method, uri and headers of `request`
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(request.method().clone(), request.uri().clone()).with_headers(request.headers().clone())
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_path_params(mut self, path_params: PathParams) -> Self {
        self.path_params = path_params;
        self
    }

    /// Marks the request as an internal data fetch, issued to reload data without a navigation.
    ///
    /// Such requests get `204 No Content` instead of `405` when the endpoint has no matching handler.
    pub fn with_data_request(mut self, data_request: bool) -> Self {
        self.data_request = data_request;
        self
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a reference to the path parameters extracted from the request URL
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    #[inline]
    pub fn is_data_request(&self) -> bool {
        self.data_request
    }
}

/// Represents path parameters extracted from the URL path of an HTTP request.
///
/// Path parameters are named segments in the URL path that can be extracted and accessed
/// by name. For example, in the path "/users/{id}", "id" is a path parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for PathParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { params: iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect() }
    }
}
