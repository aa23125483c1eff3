//! Configuration validation.
//!
//! Serde handles syntax; this module checks meaning. All problems are
//! collected so an operator sees every mistake in one run.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::BridgeConfig;
use crate::gate::policy::parse_network;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("listener.max_body_bytes must be greater than zero")]
    ZeroBodyCap,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("endpoint path '{0}' must start with '/'")]
    InvalidPath(String),

    #[error("endpoint path '{0}' is configured more than once")]
    DuplicatePath(String),

    #[error("endpoint '{0}': secret requires a key")]
    SecretWithoutKey(String),

    #[error("endpoint '{path}': invalid require_ip entry '{entry}'")]
    InvalidNetwork { path: String, entry: String },

    #[error("endpoint '{path}': invalid upstream '{upstream}' (must be an absolute http URL)")]
    InvalidUpstream { path: String, upstream: String },

    #[error("endpoint '{0}': require_tls is set but the listener has no TLS configuration")]
    TlsNotAvailable(String),

    #[error("endpoint '{path}': post_body_limit ({limit}) exceeds listener.max_body_bytes ({cap})")]
    BodyLimitAboveCap { path: String, limit: usize, cap: usize },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyCap);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        let path = &endpoint.path;
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidPath(path.clone()));
        }
        if !seen.insert(path.as_str()) {
            errors.push(ValidationError::DuplicatePath(path.clone()));
        }
        if endpoint.secret.is_some() && endpoint.key.is_none() {
            errors.push(ValidationError::SecretWithoutKey(path.clone()));
        }
        for entry in &endpoint.require_ip {
            if parse_network(entry).is_err() {
                errors.push(ValidationError::InvalidNetwork {
                    path: path.clone(),
                    entry: entry.clone(),
                });
            }
        }
        let upstream_ok = url::Url::parse(&endpoint.forward.upstream)
            .map(|u| u.scheme() == "http" && u.has_host())
            .unwrap_or(false);
        if !upstream_ok {
            errors.push(ValidationError::InvalidUpstream {
                path: path.clone(),
                upstream: endpoint.forward.upstream.clone(),
            });
        }
        if endpoint.require_tls && config.listener.tls.is_none() {
            errors.push(ValidationError::TlsNotAvailable(path.clone()));
        }
        if endpoint.post_body_limit > config.listener.max_body_bytes {
            errors.push(ValidationError::BodyLimitAboveCap {
                path: path.clone(),
                limit: endpoint.post_body_limit,
                cap: config.listener.max_body_bytes,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
