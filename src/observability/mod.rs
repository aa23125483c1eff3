//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate and HTTP layer produce:
//!     → logging.rs (structured log events, request id + log category)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
