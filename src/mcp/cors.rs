//! Cross-origin access for browser-based MCP clients.
//!
//! Preflight (`OPTIONS`) requests are answered here and never reach the
//! router. Every other response gets the same header set added before it is
//! handed to the connection, so streaming bodies are not touched.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

/// Name of the session identifier header exchanged with clients.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// `Access-Control-Allow-Origin`.
pub const ALLOW_ORIGIN: &str = "*";
/// `Access-Control-Allow-Methods`.
pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
/// `Access-Control-Allow-Headers`.
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";
/// `Access-Control-Expose-Headers`.
pub const EXPOSE_HEADERS: &str = "Mcp-Session-Id, Content-Type, Cache-Control";

/// Adds the cross-origin headers, keeping any value the handler already set.
pub fn apply_headers(headers: &mut HeaderMap) {
    for (name, value) in [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN),
        (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
        (header::ACCESS_CONTROL_EXPOSE_HEADERS, EXPOSE_HEADERS),
    ] {
        headers
            .entry(name)
            .or_insert(HeaderValue::from_static(value));
    }
}

/// Cross-origin middleware.
pub async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        tracing::debug!(path = request.uri().path(), "Answering preflight");
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;
        apply_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut());
    response
}
