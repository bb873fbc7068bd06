//! Request tracing.
//!
//! Every request runs inside an `api_request` span tagged with a request id.
//! The id is taken from `x-request-id` when the caller sent one, generated
//! otherwise, and echoed back on the response.

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    response::Response,
};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, info_span, Instrument, Span};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tracing layer that creates spans for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let request_id = request_id(&req);

        let span = info_span!(
            "api_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            request_id = %request_id,
            http.status = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let mut result = inner.call(req).await;

                if let Ok(response) = &mut result {
                    let status = response.status();
                    Span::current().record("http.status", status.as_u16());
                    if let Ok(value) = HeaderValue::from_str(&request_id) {
                        response.headers_mut().insert(REQUEST_ID_HEADER, value);
                    }
                    debug!(status = status.as_u16(), "Request completed");
                }

                result
            }
            .instrument(span),
        )
    }
}

/// Caller-supplied request id, or a fresh one.
fn request_id<B>(req: &Request<B>) -> String {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_propagated() {
        let req = Request::builder()
            .header(REQUEST_ID_HEADER, "req-42")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_id(&req), "req-42");
    }

    #[test]
    fn test_request_id_generated() {
        let req = Request::builder().body(Body::empty()).unwrap();
        let id = request_id(&req);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_oversized_request_id_replaced() {
        let req = Request::builder()
            .header(REQUEST_ID_HEADER, "x".repeat(200))
            .body(Body::empty())
            .unwrap();
        assert_ne!(request_id(&req).len(), 200);
    }
}
