//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional rustls termination)
//!     → Hand off to HTTP layer, tagged with TransportSecurity
//! ```

pub mod tls;

pub use tls::{load_tls_config, TlsError};
