//! TLS material subsystem.
//!
//! # Data Flow
//! ```text
//! CertificateSource (resolved once from the deployment toggles)
//!     Managed   → manager.rs → provider.rs (KV fetch / PKI issue)
//!     SelfSigned → self_signed.rs
//!         → material.rs (MaterialStore::set, atomic snapshot swap)
//!         → resolver.rs (every handshake loads the latest snapshot)
//! ```
//!
//! # Design Decisions
//! - The store is the only state written by one task and read by many
//! - Snapshots are immutable; a refresh publishes a new one
//! - A failed refresh never clears or partially overwrites the store

pub mod error;
pub mod manager;
pub mod material;
pub mod provider;
pub mod resolver;
pub mod self_signed;

pub use error::{CertError, CertResult};
pub use manager::{CertificateManager, CertificateSource};
pub use material::{MaterialStore, ServingCertificate, Snapshot};
pub use provider::{serving_domain, CertificateProvider, VaultCertificateProvider};
pub use resolver::StoreResolver;
