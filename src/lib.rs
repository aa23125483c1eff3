//! REST-to-pub/sub bridge gate.
//!
//! Accepts HTTP POST/PUT requests carrying JSON events, authenticates and
//! validates them, and hands each accepted event to a forwarder that
//! publishes or calls into the messaging fabric.

pub mod config;
pub mod forward;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::BridgeConfig;
pub use forward::{Forwarded, Forwarder, HttpForwarder};
pub use gate::{Denial, Gate, Outcome, RequestContext, VerificationConfig};
pub use http::BridgeServer;
pub use lifecycle::Shutdown;
