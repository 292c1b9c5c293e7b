//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection (h2 or http/1.1 via ALPN)
//!     → request.rs (request ID, trace span)
//!     → multiplex.rs (RouteDecision → RPC router | application router)
//!     → Send to client
//! ```

pub mod multiplex;
pub mod request;

pub use multiplex::Multiplexer;
pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
