//! Response construction.
//!
//! # Responsibilities
//! - CORS and cache headers on every response
//! - Pre-flight, success and denial responses
//!
//! # Design Decisions
//! - Denial bodies are one line of plain text ending in a newline
//! - Common headers are applied by middleware so 404s, timeouts and panics
//!   carry them too

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ALLOW, CACHE_CONTROL, CONTENT_TYPE,
    ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::gate::Denial;

pub const ALLOWED_METHODS: &str = "POST,PUT,OPTIONS";
pub const NO_CACHE: &str = "no-store,no-cache,must-revalidate,max-age=0";

/// Set the headers every response carries.
pub fn apply_common_headers(
    origin: Option<HeaderValue>,
    requested_headers: Option<HeaderValue>,
    headers: &mut HeaderMap,
) {
    let origin = origin
        .filter(|o| o.as_bytes() != b"null")
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    if let Some(requested) = requested_headers {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested);
    }
}

/// Middleware applying [`apply_common_headers`] to every response.
pub async fn common_headers(request: Request<Body>, next: Next) -> Response {
    let origin = request.headers().get(ORIGIN).cloned();
    let requested = request.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned();
    let mut response = next.run(request).await;
    apply_common_headers(origin, requested, response.headers_mut());
    response
}

pub fn preflight_response() -> Response {
    (
        StatusCode::OK,
        [
            (ALLOW, HeaderValue::from_static(ALLOWED_METHODS)),
            (ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS)),
        ],
    )
        .into_response()
}

pub fn success_response(body: Bytes) -> Response {
    (StatusCode::OK, body).into_response()
}

pub fn denial_response(denial: &Denial) -> Response {
    (
        denial.status(),
        [(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        denial.body(),
    )
        .into_response()
}
