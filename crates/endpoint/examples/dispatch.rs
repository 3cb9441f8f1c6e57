use http::header::IF_NONE_MATCH;
use http::{HeaderMap, Method, Uri};
use micro_endpoint::{
    BoxError, Endpoint, EndpointOptions, ErrorValue, HandlerResult, RequestContext, ResponseBody, handler_fn,
};
use serde_json::json;
use std::convert::Infallible;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

async fn list_items(req: RequestContext) -> Result<HandlerResult, Infallible> {
    let draft = req.uri().query().is_some_and(|query| query.contains("draft"));
    Ok(HandlerResult::json(json!({"items": [{"id": 1, "draft": draft}]})).header("cache-control", "max-age=60"))
}

async fn create_item(req: RequestContext) -> Result<HandlerResult, BoxError> {
    if req.headers().get("authorization").is_none() {
        return Ok(HandlerResult::error(ErrorValue::new("missing credentials").with_name("AuthError")).status(401));
    }
    Ok(HandlerResult::json(json!({"id": 2})).status(201).header("location", "/items/2"))
}

fn print(label: &str, response: &http::Response<ResponseBody>) {
    let body = response.body().as_bytes().map(|bytes| String::from_utf8_lossy(bytes).into_owned());
    info!(label, status = response.status().as_u16(), headers = ?response.headers(), body = ?body, "response");
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let endpoint = Endpoint::builder().get(handler_fn(list_items)).post(handler_fn(create_item)).build();
    let options = EndpointOptions::default();
    let uri = Uri::from_static("/items?draft=1");

    let requests = [
        ("get", RequestContext::new(Method::GET, uri.clone())),
        ("head", RequestContext::new(Method::HEAD, uri.clone())),
        ("post without credentials", RequestContext::new(Method::POST, uri.clone())),
        ("delete", RequestContext::new(Method::DELETE, uri.clone())),
        ("delete as data request", RequestContext::new(Method::DELETE, uri.clone()).with_data_request(true)),
    ];

    let mut etag = None;
    for (label, req) in requests {
        match endpoint.dispatch(&req, &options).await {
            Ok(response) => {
                if label == "get" {
                    etag = response.headers().get("etag").cloned();
                }
                print(label, &response);
            }
            Err(e) => error!(cause = %e, "dispatch failed"),
        }
    }

    if let Some(etag) = etag {
        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, etag);
        let req = RequestContext::new(Method::GET, uri).with_headers(headers);
        match endpoint.dispatch(&req, &options).await {
            Ok(response) => print("revalidation", &response),
            Err(e) => error!(cause = %e, "dispatch failed"),
        }
    }
}
