//! Gate orchestration.
//!
//! Runs the stages in a fixed order and stops at the first denial:
//!
//! ```text
//! RECEIVED → FRAMED → SIGNATURE-CHECKED → POLICY-CHECKED → DECODED → DISPATCHED
//!     └────────┴──────────┴───────────────────┴──────────────┴──→ DENIED
//! ```

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ipnet::IpNet;

use crate::config::{EndpointConfig, ValidationError};
use crate::forward::{ForwardFuture, Forwarded, Forwarder};
use crate::gate::context::RequestContext;
use crate::gate::denial::Denial;
use crate::gate::payload::{self, DecodedEvent};
use crate::gate::policy::{self, AllowAll, Authorizer};
use crate::gate::{framing, signature};

/// Per-endpoint verification settings, fixed at mount time.
#[derive(Clone, Default)]
pub struct VerificationConfig {
    pub key: Option<Vec<u8>>,
    pub secret: Option<Vec<u8>>,
    /// Zero means unlimited.
    pub post_body_limit: usize,
    /// Seconds; zero means unlimited.
    pub timestamp_delta_limit: u64,
    /// Empty means unrestricted.
    pub require_ip: Vec<IpNet>,
    pub require_tls: bool,
}

impl VerificationConfig {
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Result<Self, ValidationError> {
        let require_ip = endpoint
            .require_ip
            .iter()
            .map(|entry| {
                policy::parse_network(entry).map_err(|_| ValidationError::InvalidNetwork {
                    path: endpoint.path.clone(),
                    entry: entry.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            key: endpoint.key.as_ref().map(|k| k.as_bytes().to_vec()),
            secret: endpoint.secret.as_ref().map(|s| s.as_bytes().to_vec()),
            post_body_limit: endpoint.post_body_limit,
            timestamp_delta_limit: endpoint.timestamp_delta_limit,
            require_ip,
            require_tls: endpoint.require_tls,
        })
    }

    pub fn is_signed(&self) -> bool {
        self.secret.is_some()
    }
}

impl fmt::Debug for VerificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationConfig")
            .field("key", &self.key.as_deref().map(String::from_utf8_lossy))
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("post_body_limit", &self.post_body_limit)
            .field("timestamp_delta_limit", &self.timestamp_delta_limit)
            .field("require_ip", &self.require_ip)
            .field("require_tls", &self.require_tls)
            .finish()
    }
}

/// What the HTTP layer should do with a request.
pub enum Outcome {
    /// CORS pre-flight: 200 with the allowed methods.
    Preflight,
    Denied(Denial),
    /// Forwarded; write these bytes with 200.
    Completed(Bytes),
    /// Forwarded; the response is written once the future resolves.
    Pending(ForwardFuture),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Preflight => f.write_str("Preflight"),
            Outcome::Denied(denial) => f.debug_tuple("Denied").field(denial).finish(),
            Outcome::Completed(body) => f.debug_tuple("Completed").field(body).finish(),
            Outcome::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// The validation gate in front of one forwarder.
pub struct Gate {
    config: VerificationConfig,
    forwarder: Arc<dyn Forwarder>,
    authorizer: Arc<dyn Authorizer>,
}

impl Gate {
    pub fn new(config: VerificationConfig, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            config,
            forwarder,
            authorizer: Arc::new(AllowAll),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Run every check against `ctx`, using `now` for timestamp freshness.
    pub fn check(&self, ctx: &RequestContext, now: DateTime<Utc>) -> Result<DecodedEvent, Denial> {
        framing::check_method(&ctx.method)?;
        framing::check_framing(&ctx.headers, &ctx.body, self.config.post_body_limit)?;

        let material = signature::extract_fields(&ctx.query, &self.config, now)?;
        let verified_key = signature::verify(&material, &self.config, &ctx.body)?;

        policy::check_client_ip(ctx.client_ip, &self.config.require_ip)?;
        policy::check_tls(ctx.tls, self.config.require_tls)?;
        policy::check_authorized(self.authorizer.as_ref(), ctx, verified_key.as_deref())?;

        payload::decode(&ctx.body)
    }

    /// Gate the request and, if allowed, dispatch it.
    pub fn handle(&self, ctx: &RequestContext) -> Outcome {
        if ctx.method == Method::OPTIONS {
            return Outcome::Preflight;
        }

        let event = match self.check(ctx, Utc::now()) {
            Ok(event) => event,
            Err(denial) => return Outcome::Denied(denial),
        };

        match self.forwarder.forward(ctx, event) {
            Ok(Forwarded::Immediate(body)) => Outcome::Completed(body),
            Ok(Forwarded::Pending(pending)) => Outcome::Pending(pending),
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "Forwarder failed");
                Outcome::Denied(Denial::Internal)
            }
        }
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate").field("config", &self.config).finish_non_exhaustive()
    }
}
