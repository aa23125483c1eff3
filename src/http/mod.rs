//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, one route per endpoint)
//!     → request.rs (RequestContext: headers, query, body, client IP, TLS)
//!     → gate (validation pipeline + forwarder)
//!     → response.rs (status, body, CORS/cache headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{TransportSecurity, X_REQUEST_ID};
pub use server::BridgeServer;
