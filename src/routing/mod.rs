//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (negotiated version, content-type)
//!     → decision.rs (RouteDecision::for_request)
//!     → RPC router | application router (http/multiplex.rs)
//! ```
//!
//! # Design Decisions
//! - One rule, evaluated per request
//! - Deterministic: same input always yields the same decision

pub mod decision;

pub use decision::{RouteDecision, RPC_CONTENT_TYPE_PREFIX};
