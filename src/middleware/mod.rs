// ABOUTME: HTTP middleware for request tracing, CORS, and quota headers
// ABOUTME: Provides request ID propagation, span creation, and rate limit header rendering

pub mod cors;
pub mod rate_limiting;
pub mod tracing;

// CORS configuration
pub use cors::setup_cors;

// Quota header rendering
pub use rate_limiting::{create_rate_limit_headers, headers};

// Request tracing and context management
pub use tracing::{create_request_span, request_id_middleware, RequestContext, REQUEST_ID_HEADER};
