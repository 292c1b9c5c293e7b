//! Background jobs subsystem.
//!
//! # Data Flow
//! ```text
//! startup
//!     → registry.rs (handlers + periodic schedules registered explicitly)
//!     → worker.rs (periodic loops per queue, ad-hoc jobs via JobQueue)
//!     → supervisor.rs (spawned with the shared shutdown; Cancelled = clean)
//! ```
//!
//! # Design Decisions
//! - No global registry; the registry object is passed to whoever registers
//! - Fixed queue set from configuration
//! - Job failures are logged; the worker keeps going

pub mod registry;
pub mod supervisor;
pub mod worker;

pub use registry::{handler_fn, JobError, JobHandler, JobRegistry, PeriodicJob};
pub use supervisor::{supervise, JobEngine, WorkerExit};
pub use worker::{JobQueue, Worker};

/// Job renewing the serving certificate when it nears expiry.
pub const RENEW_CERTIFICATE_JOB: &str = "renew-hub-tls";

/// Queue periodic jobs are bound to.
pub const DEFAULT_QUEUE: &str = "default";
