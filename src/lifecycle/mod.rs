//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Bootstrap credential → Resolve certificate source
//!     → DNS setup → Fetch material → Start workers → Construct listener → Accept
//!
//! Background loops (periodic.rs):
//!     ticker + shutdown signal, one shape for every loop
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → trigger → every loop and the listener stop
//! ```
//!
//! # Design Decisions
//! - Startup is strictly sequential; any startup error is fatal
//! - One shutdown signal is threaded through every long-running task
//! - Listener starts last (traffic only when material is installed)

pub mod periodic;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use periodic::run_periodic;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{launch, Collaborators, Gateway, StartupError};
