//! Secrets backend subsystem.
//!
//! # Data Flow
//! ```text
//! startup
//!     → bootstrap.rs (ambient token? identity file? → login exchange)
//!     → client.rs (token installed for every later call)
//!     → CredentialRenewer (renew-self every interval, re-login once the lease lapsed)
//!
//! certificate lifecycle
//!     → client.rs (KV reads/writes, PKI issuance)
//! ```
//!
//! # Design Decisions
//! - The backend sits behind the `SecretsBackend` trait so tests script responses
//! - The credential is never handed out; its effect is only visible through backend calls
//! - Every call carries the client-side request timeout

pub mod bootstrap;
pub mod client;
pub mod types;

pub use bootstrap::{
    BootstrapError, BootstrapOutcome, CredentialBootstrapper, CredentialRenewer, RenewOutcome,
};
pub use client::{SecretsBackend, VaultClient};
pub use types::{AccessCredential, VaultError, VaultResult};
