//! Method dispatch and response normalization for HTTP endpoints.
//!
//! The routing layer resolves a request to an [`Endpoint`]: a set of handlers keyed by
//! method. This crate takes it from there:
//!
//! - selects the handler for the request method, serving `HEAD` with `GET`
//! - answers `405 Method Not Allowed` (with `allow`) when there is none, or `204` for
//!   internal data requests
//! - turns the handler's result into a response: JSON encoding, content-type checks,
//!   `etag` generation, and no body where HTTP forbids one
//! - answers `304 Not Modified` to `If-None-Match` revalidations
//!
//! # Example
//!
//! ```
//! use http::{Method, StatusCode, Uri};
//! use micro_endpoint::{handler_fn, Endpoint, EndpointOptions, HandlerResult, RequestContext};
//! use serde_json::json;
//! use std::convert::Infallible;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let endpoint = Endpoint::builder()
//!     .get(handler_fn(|_req: RequestContext| async {
//!         Ok::<_, Infallible>(HandlerResult::json(json!({"items": []})))
//!     }))
//!     .build();
//!
//! let req = RequestContext::new(Method::GET, Uri::from_static("/items"));
//! let response = endpoint.dispatch(&req, &EndpointOptions::default()).await.unwrap();
//!
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(response.headers()["content-type"], "application/json; charset=utf-8");
//! assert!(response.headers().contains_key("etag"));
//! # }
//! ```

mod body;
mod content_type;
mod endpoint;
mod error;
mod error_value;
mod handler;
mod options;
mod request;
mod result;
mod validate;

pub mod conditional;
pub mod etag;
pub mod normalize;

pub use body::BodyStream;
pub use body::BodyValue;
pub use body::BoxError;
pub use body::ResponseBody;
pub use content_type::is_textual;
pub use endpoint::Endpoint;
pub use endpoint::EndpointBuilder;
pub use endpoint::EndpointMethod;
pub use error::BodyTypeError;
pub use error::EndpointError;
pub use error::InvalidResponseShape;
pub use error_value::ErrorValue;
pub use error_value::serialize_error;
pub use handler::EndpointHandler;
pub use handler::FnHandler;
pub use handler::handler_fn;
pub use normalize::normalize;
pub use options::EndpointOptions;
pub use request::PathParams;
pub use request::RequestContext;
pub use result::HandlerOutput;
pub use result::HandlerResult;
pub use validate::validate_body;
