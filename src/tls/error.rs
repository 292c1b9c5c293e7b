//! Certificate lifecycle error definitions.

use thiserror::Error;
use time::OffsetDateTime;

use crate::vault::VaultError;

/// Errors that can occur while producing, fetching, or installing serving material.
#[derive(Debug, Error)]
pub enum CertError {
    /// Key or certificate generation failed.
    #[error("Certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    /// PEM input could not be decoded.
    #[error("Invalid PEM: {0}")]
    Pem(String),

    /// DER certificate could not be parsed.
    #[error("Certificate parse failed: {0}")]
    Parse(String),

    /// Private key missing or not usable for signing.
    #[error("Private key rejected: {0}")]
    InvalidKey(String),

    /// No certificate in the supplied chain.
    #[error("Certificate chain is empty")]
    EmptyChain,

    /// The managed system has nothing stored for this domain yet.
    #[error("No certificate issued for {0}")]
    NotIssued(String),

    /// A stored or issued record lacks required fields.
    #[error("Malformed certificate record at {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// Material is not valid right now.
    #[error(
        "Certificate for {domain} is outside its validity window \
         ({not_before} .. {not_after})"
    )]
    OutsideValidity {
        domain: String,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    },

    /// Secrets backend call failed.
    #[error(transparent)]
    Backend(#[from] VaultError),

    /// Nothing installed in the material store yet.
    #[error("No serving material installed")]
    NoMaterial,

    /// TLS configuration could not be built.
    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),
}

/// Result type for certificate operations.
pub type CertResult<T> = Result<T, CertError>;
