// ABOUTME: Request tracing middleware for correlation and structured logging
// ABOUTME: Propagates or generates request IDs and creates spans for all HTTP requests

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::HeaderValue;
use tracing::field::Empty;
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

/// Header carrying the request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request context that flows through the request lifecycle
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation ID, propagated from the client or generated
    pub request_id: String,
}

impl RequestContext {
    /// Create new request context with generated request ID
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: format!("req_{}", Uuid::new_v4().simple()),
        }
    }

    /// Context reusing a client-supplied ID when it is usable
    #[must_use]
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        value
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= 128)
            .map_or_else(Self::new, |id| Self {
                request_id: id.to_owned(),
            })
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a tracing span for HTTP requests
pub fn create_request_span(method: &str, path: &str, request_id: &str) -> Span {
    info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
        identity = Empty,
        status_code = Empty,
    )
}

/// Attach a request ID to the request extensions, the span, and the response
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let context = RequestContext::from_header(request.headers().get(REQUEST_ID_HEADER));
    let span = create_request_span(
        request.method().as_str(),
        request.uri().path(),
        &context.request_id,
    );
    let request_id = context.request_id.clone();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).instrument(span.clone()).await;
    span.record("status_code", response.status().as_u16());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_client_request_id() {
        let value = HeaderValue::from_static("abc-123");
        assert_eq!(RequestContext::from_header(Some(&value)).request_id, "abc-123");
    }

    #[test]
    fn test_generates_request_id_when_missing_or_blank() {
        assert!(RequestContext::from_header(None).request_id.starts_with("req_"));
        let blank = HeaderValue::from_static("  ");
        assert!(RequestContext::from_header(Some(&blank))
            .request_id
            .starts_with("req_"));
    }
}
