//! Inbound request handling.
//!
//! # Responsibilities
//! - Turn an axum request into a `RequestContext`
//! - Read the body up to the listener cap
//! - Recover client address and transport security from extensions

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use bytes::Bytes;

use crate::gate::{Denial, RequestContext};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Whether the connection a request arrived on is TLS-protected.
///
/// Inserted as a request extension by the server; absent means plain TCP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportSecurity {
    pub tls: bool,
}

/// Build a context from request metadata. The body is attached separately.
pub fn context_from_parts(parts: &Parts) -> RequestContext {
    let request_id = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let tls = parts
        .extensions
        .get::<TransportSecurity>()
        .is_some_and(|security| security.tls);

    RequestContext::new(parts.method.clone(), parts.uri.path())
        .with_request_id(request_id)
        .with_headers(parts.headers.clone())
        .with_query(parts.uri.query().unwrap_or(""))
        .with_client_ip(client_ip)
        .with_tls(tls)
}

/// Read the whole body, refusing anything over `max_body_bytes`.
pub async fn read_body(body: Body, max_body_bytes: usize) -> Result<Bytes, Denial> {
    axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|_| Denial::BodyUnreadable { limit: max_body_bytes })
}
