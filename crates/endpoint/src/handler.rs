use crate::RequestContext;
use crate::body::BoxError;
use crate::result::HandlerOutput;
use async_trait::async_trait;

/// One method of an endpoint.
///
/// Errors are not turned into responses by the engine: they are returned to the caller
/// of [`Endpoint::dispatch`](crate::Endpoint::dispatch) as is.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EndpointHandler: Send + Sync {
    async fn invoke(&self, req: &RequestContext) -> Result<HandlerOutput, BoxError>;
}

#[async_trait]
impl<H: EndpointHandler + ?Sized> EndpointHandler for Box<H> {
    async fn invoke(&self, req: &RequestContext) -> Result<HandlerOutput, BoxError> {
        (**self).invoke(req).await
    }
}

/// an async fn holder which represents a handler
#[derive(Debug, Clone, Copy)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    fn new(f: F) -> Self {
        Self { f }
    }
}

/// Wraps an async fn taking the [`RequestContext`] by value into an [`EndpointHandler`].
///
/// # Example
/// ```
/// use micro_endpoint::{handler_fn, HandlerResult, RequestContext};
/// use std::convert::Infallible;
///
/// let handler = handler_fn(|req: RequestContext| async move {
///     Ok::<_, Infallible>(HandlerResult::text(format!("hello from {}", req.uri().path())))
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut, R, E>(f: F) -> FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Into<HandlerOutput> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    FnHandler::new(f)
}

#[async_trait]
impl<F, Fut, R, E> EndpointHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Into<HandlerOutput> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    async fn invoke(&self, req: &RequestContext) -> Result<HandlerOutput, BoxError> {
        (self.f)(req.clone()).await.map(Into::into).map_err(Into::into)
    }
}
