//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::forward::ForwardMode;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener configuration (bind address, TLS, body cap).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Mounted REST endpoints.
    pub endpoints: Vec<EndpointConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Largest request body read for endpoints that set a `post_body_limit`.
    /// Endpoints without one read the whole body.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One REST endpoint and its verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// URL path the endpoint is mounted at.
    pub path: String,

    /// Where allowed events go.
    pub forward: ForwardConfig,

    /// Identifier of the signing secret.
    #[serde(default)]
    pub key: Option<String>,

    /// Shared signing secret. When set, every request must be signed.
    #[serde(default)]
    pub secret: Option<String>,

    /// Maximum body size in bytes (0 = unlimited).
    #[serde(default)]
    pub post_body_limit: usize,

    /// Accepted clock skew for signed timestamps in seconds (0 = unlimited).
    #[serde(default = "default_timestamp_delta_limit")]
    pub timestamp_delta_limit: u64,

    /// Allowed client networks in CIDR notation (empty = any).
    #[serde(default)]
    pub require_ip: Vec<String>,

    /// Reject requests not received over TLS.
    #[serde(default)]
    pub require_tls: bool,
}

fn default_timestamp_delta_limit() -> u64 {
    300
}

/// Forwarding target for an endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardConfig {
    /// `publish` acknowledges immediately; `call` waits for the upstream.
    pub mode: ForwardMode,

    /// Upstream URL (http).
    pub upstream: String,
}
