//! Downstream forwarding.
//!
//! # Data Flow
//! ```text
//! Gate (request allowed, event decoded)
//!     → Forwarder::forward(ctx, event)
//!         → Forwarded::Immediate(bytes)   response written now
//!         → Forwarded::Pending(future)    response written when it resolves
//! ```
//!
//! The gate knows nothing about what a forwarder does with the event.
//! `upstream.rs` provides the HTTP forwarder the service binary mounts.

pub mod upstream;

use std::fmt;

use axum::http::StatusCode;
use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::gate::{DecodedEvent, RequestContext};

pub use upstream::{ForwardMode, HttpForwarder};

/// Completion of a deferred forward: the response body, or a failure.
pub type ForwardFuture = BoxFuture<'static, Result<Bytes, ForwardError>>;

/// Result of handing an event to a forwarder.
pub enum Forwarded {
    /// Write these bytes as the response body right away.
    Immediate(Bytes),
    /// Keep the response open until the future resolves.
    Pending(ForwardFuture),
}

impl fmt::Debug for Forwarded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forwarded::Immediate(body) => f.debug_tuple("Immediate").field(body).finish(),
            Forwarded::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Errors raised by a forwarder. All of them surface to the client as 500.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream returned {0}")]
    Status(StatusCode),

    #[error("failed to read upstream response: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

/// The capability the gate dispatches allowed events to.
pub trait Forwarder: Send + Sync {
    fn forward(&self, ctx: &RequestContext, event: DecodedEvent) -> Result<Forwarded, ForwardError>;
}
