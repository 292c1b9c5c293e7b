//! Secrets backend types and error definitions.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Short-lived token authenticating this process to the secrets backend.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    /// The bearer token itself.
    pub token: String,
    /// Non-secret handle for the token, safe to log.
    pub accessor: Option<String>,
    /// When the current lease started.
    pub issued_at: Instant,
    /// Length of the current lease.
    pub lease_duration: Duration,
    /// Whether the backend allows self-renewal.
    pub renewable: bool,
}

impl AccessCredential {
    /// End of the current lease.
    pub fn expires_at(&self) -> Instant {
        self.issued_at + self.lease_duration
    }

    /// Whether the lease has lapsed at `now`.
    ///
    /// A zero lease never expires (root-style tokens).
    pub fn is_expired(&self, now: Instant) -> bool {
        !self.lease_duration.is_zero() && now >= self.expires_at()
    }
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &"<redacted>")
            .field("accessor", &self.accessor)
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .finish()
    }
}

/// Errors that can occur while talking to the secrets backend.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Backend address could not be parsed.
    #[error("Invalid secrets backend address: {0}")]
    InvalidAddress(String),

    /// Transport failure, including the client-side request timeout.
    #[error("Secrets backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("Secrets backend returned {status}: {errors}")]
    Status { status: u16, errors: String },

    /// Response body did not have the expected shape.
    #[error("Unexpected secrets backend response: {0}")]
    Decode(String),

    /// A token operation answered without an auth block.
    #[error("Secrets backend response carried no auth block")]
    MissingAuth,
}

/// Result type for secrets backend operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Envelope shared by every backend response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SecretResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub auth: Option<AuthBlock>,
}

/// The `auth` section of login and renewal responses.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthBlock {
    pub client_token: String,
    #[serde(default)]
    pub accessor: Option<String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

impl AuthBlock {
    pub(crate) fn into_credential(self, issued_at: Instant) -> AccessCredential {
        AccessCredential {
            token: self.client_token,
            accessor: self.accessor.filter(|a| !a.is_empty()),
            issued_at,
            lease_duration: Duration::from_secs(self.lease_duration),
            renewable: self.renewable,
        }
    }
}

/// Error body returned with non-success statuses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}
