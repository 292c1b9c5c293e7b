//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML, tuning knobs)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (overlay deployment values from the environment)
//!     → validation.rs (semantic checks)
//!     → ControlConfig (validated, immutable)
//!     → handed to startup, never mutated afterwards
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All tuning fields have defaults; deployment values are required
//! - Environment lookup is injected so tests never touch the process environment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::ControlConfig;
pub use schema::DeploymentConfig;
pub use schema::HealthConfig;
pub use schema::JobsConfig;
pub use schema::ListenerConfig;
pub use schema::TlsConfig;
pub use schema::VaultConfig;
pub use schema::MAX_SELF_SIGNED_VALIDITY_DAYS;
