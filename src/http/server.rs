//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with one gated route per configured endpoint
//! - Wire up middleware (tracing, timeout, request ID, panics, common headers)
//! - Serve over plain TCP or rustls
//! - Turn gate outcomes into HTTP responses

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware,
    response::Response,
    routing::any,
    Extension, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{BridgeConfig, ValidationError};
use crate::forward::HttpForwarder;
use crate::gate::{framing, Denial, Gate, Outcome, RequestContext, VerificationConfig};
use crate::http::request::{self, TransportSecurity};
use crate::http::response;
use crate::observability::metrics;

/// Per-route state injected into the gate handler.
#[derive(Clone)]
struct EndpointState {
    path: Arc<str>,
    gate: Arc<Gate>,
    max_body_bytes: usize,
}

/// HTTP server for the bridge.
pub struct BridgeServer {
    router: Router,
    config: BridgeConfig,
}

impl BridgeServer {
    /// Mount every configured endpoint in front of an [`HttpForwarder`].
    pub fn new(config: BridgeConfig) -> Result<Self, ValidationError> {
        let mut gates = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            let verification = VerificationConfig::from_endpoint(endpoint)?;
            let upstream = endpoint.forward.upstream.parse().map_err(|_| ValidationError::InvalidUpstream {
                path: endpoint.path.clone(),
                upstream: endpoint.forward.upstream.clone(),
            })?;
            let forwarder = Arc::new(HttpForwarder::new(endpoint.forward.mode, upstream));

            tracing::info!(
                path = %endpoint.path,
                mode = endpoint.forward.mode.as_str(),
                upstream = %endpoint.forward.upstream,
                signed = verification.is_signed(),
                require_tls = verification.require_tls,
                allowed_networks = verification.require_ip.len(),
                "Endpoint mounted"
            );
            if verification.is_signed() {
                // seq/nonce are parsed but never remembered.
                tracing::warn!(
                    path = %endpoint.path,
                    timestamp_delta_limit = verification.timestamp_delta_limit,
                    "Signed requests can be replayed within the timestamp window"
                );
            }
            gates.push((endpoint.path.clone(), Gate::new(verification, forwarder)));
        }
        Ok(Self::with_gates(config, gates))
    }

    /// Mount caller-supplied gates, e.g. with custom forwarders or authorizers.
    pub fn with_gates(config: BridgeConfig, gates: Vec<(String, Gate)>) -> Self {
        let router = Self::build_router(&config, gates);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &BridgeConfig, gates: Vec<(String, Gate)>) -> Router {
        let mut router = Router::new();
        for (path, gate) in gates {
            let state = EndpointState {
                path: Arc::from(path.as_str()),
                max_body_bytes: read_limit(gate.config().post_body_limit, config.listener.max_body_bytes),
                gate: Arc::new(gate),
            };
            router = router.route(&path, any(gate_handler).with_state(state));
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn(response::common_headers))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for embedding or driving directly in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, endpoints = self.config.endpoints.len(), "HTTP server starting");

        let app = self
            .router
            .layer(Extension(TransportSecurity { tls: false }))
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, endpoints = self.config.endpoints.len(), "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let drain = Duration::from_secs(self.config.timeouts.request_secs);
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            shutdown_handle.graceful_shutdown(Some(drain));
        });

        let app = self
            .router
            .layer(Extension(TransportSecurity { tls: true }))
            .into_make_service_with_connect_info::<SocketAddr>();

        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

/// Read cap for an endpoint; a zero `post_body_limit` means no cap.
fn read_limit(post_body_limit: usize, max_body_bytes: usize) -> usize {
    if post_body_limit == 0 {
        usize::MAX
    } else {
        max_body_bytes.max(post_body_limit)
    }
}

/// Gate handler shared by every endpoint.
async fn gate_handler(State(endpoint): State<EndpointState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let ctx = request::context_from_parts(&parts);

    tracing::debug!(
        request_id = %ctx.request_id,
        method = %ctx.method,
        path = %ctx.path,
        client_ip = ?ctx.client_ip,
        "Gating request"
    );

    if ctx.method == Method::OPTIONS {
        metrics::record_request(&endpoint.path, 200, start);
        return response::preflight_response();
    }
    if let Err(denial) = framing::check_method(&ctx.method) {
        return deny(&endpoint, &ctx, denial, start);
    }

    let ctx = match request::read_body(body, endpoint.max_body_bytes).await {
        Ok(bytes) => ctx.with_body(bytes),
        Err(denial) => return deny(&endpoint, &ctx, denial, start),
    };

    match endpoint.gate.handle(&ctx) {
        Outcome::Preflight => {
            metrics::record_request(&endpoint.path, 200, start);
            response::preflight_response()
        }
        Outcome::Denied(denial) => deny(&endpoint, &ctx, denial, start),
        Outcome::Completed(body) => complete(&endpoint, &ctx, body, start),
        // Dropping this future on client disconnect cancels the forward.
        Outcome::Pending(pending) => match pending.await {
            Ok(body) => complete(&endpoint, &ctx, body, start),
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "Deferred forward failed");
                deny(&endpoint, &ctx, Denial::Internal, start)
            }
        },
    }
}

fn deny(endpoint: &EndpointState, ctx: &RequestContext, denial: Denial, start: Instant) -> Response {
    let status = denial.status();
    let log_category = denial.log_category();
    tracing::debug!(
        request_id = %ctx.request_id,
        code = status.as_u16(),
        log_category,
        reason = %denial,
        "[request denied]"
    );
    metrics::record_denial(&endpoint.path, log_category);
    metrics::record_request(&endpoint.path, status.as_u16(), start);
    response::denial_response(&denial)
}

fn complete(endpoint: &EndpointState, ctx: &RequestContext, body: bytes::Bytes, start: Instant) -> Response {
    tracing::debug!(
        request_id = %ctx.request_id,
        code = 200,
        log_category = "AR200",
        bytes = body.len(),
        "[request succeeded]"
    );
    metrics::record_request(&endpoint.path, 200, start);
    response::success_response(body)
}

fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(log_category = "AR500", panic = %detail, "Unhandled server error");
    response::denial_response(&Denial::Internal)
}
