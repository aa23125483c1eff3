//! HTTP upstream forwarder.
//!
//! Posts the decoded event as JSON to a configured upstream URL.
//!
//! # Modes
//! - `publish`: acknowledge immediately with a publication id, deliver in
//!   the background. Delivery failures are logged.
//! - `call`: hold the client response open until the upstream answers and
//!   relay its body.

use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use bytes::Bytes;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};

use crate::forward::{ForwardError, Forwarded, Forwarder};
use crate::gate::{DecodedEvent, RequestContext};
use crate::observability::metrics;

const MAX_UPSTREAM_RESPONSE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    Publish,
    Call,
}

impl ForwardMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ForwardMode::Publish => "publish",
            ForwardMode::Call => "call",
        }
    }
}

/// Forwards events to an upstream HTTP endpoint.
#[derive(Clone)]
pub struct HttpForwarder {
    mode: ForwardMode,
    upstream: Uri,
    client: Client<HttpConnector, Body>,
}

impl HttpForwarder {
    pub fn new(mode: ForwardMode, upstream: Uri) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { mode, upstream, client }
    }

    pub fn mode(&self) -> ForwardMode {
        self.mode
    }

    pub fn upstream(&self) -> &Uri {
        &self.upstream
    }
}

impl std::fmt::Debug for HttpForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpForwarder")
            .field("mode", &self.mode)
            .field("upstream", &self.upstream)
            .finish()
    }
}

impl Forwarder for HttpForwarder {
    fn forward(&self, ctx: &RequestContext, event: DecodedEvent) -> Result<Forwarded, ForwardError> {
        let payload = Bytes::from(serde_json::to_vec(&event)?);
        let client = self.client.clone();
        let upstream = self.upstream.clone();
        let request_id = ctx.request_id.clone();
        let mode = self.mode;

        match mode {
            ForwardMode::Publish => {
                let publication_id = uuid::Uuid::new_v4().to_string();
                let id = publication_id.clone();
                tokio::spawn(async move {
                    let start = Instant::now();
                    match deliver(&client, upstream, &request_id, payload).await {
                        Ok(_) => {
                            metrics::record_forward(mode.as_str(), "ok", start);
                            tracing::debug!(request_id = %request_id, publication_id = %id, "Event published");
                        }
                        Err(e) => {
                            metrics::record_forward(mode.as_str(), "error", start);
                            tracing::error!(request_id = %request_id, publication_id = %id, error = %e, "Publish to upstream failed");
                        }
                    }
                });
                let body = serde_json::to_vec(&serde_json::json!({ "id": publication_id }))?;
                Ok(Forwarded::Immediate(Bytes::from(body)))
            }
            ForwardMode::Call => Ok(Forwarded::Pending(Box::pin(async move {
                let start = Instant::now();
                let result = deliver(&client, upstream, &request_id, payload).await;
                let outcome = if result.is_ok() { "ok" } else { "error" };
                metrics::record_forward(mode.as_str(), outcome, start);
                result
            }))),
        }
    }
}

async fn deliver(
    client: &Client<HttpConnector, Body>,
    upstream: Uri,
    request_id: &str,
    payload: Bytes,
) -> Result<Bytes, ForwardError> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(upstream)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-request-id", request_id)
        .body(Body::from(payload))?;

    let response = client.request(request).await?;
    let status = response.status();
    let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_UPSTREAM_RESPONSE)
        .await
        .map_err(|e| ForwardError::Body(e.to_string()))?;

    if !status.is_success() {
        return Err(ForwardError::Status(status));
    }
    Ok(body)
}
