//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → idle.rs (idle deadline on every read/write)
//!     → tls.rs (rustls, ALPN h2/http1.1, certificate resolved per handshake)
//!     → listener.rs (axum-server accept loop, graceful drain)
//!     → Hand off to HTTP layer (http/multiplex.rs)
//! ```
//!
//! # Design Decisions
//! - One port for both protocols
//! - Idle connections reclaimed after a bounded timeout
//! - Accept errors other than shutdown are fatal; restarts belong to the process manager

pub mod idle;
pub mod listener;
pub mod tls;

pub use listener::{ListenerError, MultiplexListener};
