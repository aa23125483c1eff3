//! Request validation gate.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → framing.rs   (method, Content-Type, charset, Content-Length, body limit)
//!     → signature.rs (key/timestamp/seq/nonce/signature, HMAC-SHA256)
//!     → policy.rs    (IP allow-list, TLS, authorization hook)
//!     → payload.rs   (UTF-8, JSON object)
//!     → pipeline.rs  (dispatch to the Forwarder)
//! ```
//!
//! # Design Decisions
//! - Every stage is a plain function returning `Result<_, Denial>`
//! - First failure wins; stage order is fixed
//! - No state survives a request; configuration is read-only

pub mod context;
pub mod denial;
pub mod framing;
pub mod payload;
pub mod pipeline;
pub mod policy;
pub mod signature;

pub use context::RequestContext;
pub use denial::{Denial, DenialKind};
pub use payload::DecodedEvent;
pub use pipeline::{Gate, Outcome, VerificationConfig};
pub use policy::{AllowAll, Authorizer};
pub use signature::{SignatureMaterial, SignedQuery};
