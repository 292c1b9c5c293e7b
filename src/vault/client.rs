//! Secrets backend HTTP client.
//!
//! # Responsibilities
//! - Speak the backend's JSON HTTP API (`/v1/...`) with the current token
//! - Bound every call with the configured request timeout
//! - Hold the token so login and renewal can replace it atomically

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::config::VaultConfig;
use crate::vault::types::{AccessCredential, ErrorBody, SecretResponse, VaultError, VaultResult};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Operations the gateway needs from its secrets backend.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// Token currently attached to requests, if any.
    fn token(&self) -> Option<String>;

    /// Replace the token attached to requests.
    fn set_token(&self, token: &str);

    /// Exchange a workload identity token for a credential.
    ///
    /// `Ok(None)` means the backend answered without issuing one.
    async fn login_workload(&self, role: &str, jwt: &str) -> VaultResult<Option<AccessCredential>>;

    /// Extend the lease of the current token.
    async fn renew_self(&self, increment: Duration) -> VaultResult<AccessCredential>;

    /// Read the `data` section at `path`; `None` when nothing is stored there.
    async fn read(&self, path: &str) -> VaultResult<Option<Value>>;

    /// Write `body` to `path`, returning the response's `data` section if any.
    async fn write(&self, path: &str, body: &Value) -> VaultResult<Option<Value>>;
}

/// [`SecretsBackend`] over the Vault HTTP API.
pub struct VaultClient {
    http: reqwest::Client,
    address: Url,
    auth_mount: String,
    token: ArcSwapOption<String>,
}

impl VaultClient {
    /// Build a client from configuration. A configured token is attached immediately.
    pub fn new(config: &VaultConfig) -> VaultResult<Self> {
        let mut raw = config.address.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let address = Url::parse(&raw)
            .map_err(|e| VaultError::InvalidAddress(format!("{}: {}", config.address, e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let client = Self {
            http,
            address,
            auth_mount: config.auth_mount.trim_matches('/').to_string(),
            token: ArcSwapOption::empty(),
        };

        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            client.set_token(token);
        }

        Ok(client)
    }

    fn endpoint(&self, path: &str) -> VaultResult<Url> {
        self.address
            .join(&format!("v1/{}", path.trim_start_matches('/')))
            .map_err(|e| VaultError::InvalidAddress(format!("{}: {}", path, e)))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> VaultResult<Option<SecretResponse>> {
        let url = self.endpoint(path)?;
        let mut request = self.http.request(method, url);
        if let Some(token) = self.token.load_full() {
            request = request.header(TOKEN_HEADER, token.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if !status.is_success() {
            let errors = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.errors.join("; "))
                .unwrap_or_default();
            return Err(VaultError::Status {
                status: status.as_u16(),
                errors,
            });
        }

        let parsed = response
            .json::<SecretResponse>()
            .await
            .map_err(|e| VaultError::Decode(e.to_string()))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl SecretsBackend for VaultClient {
    fn token(&self) -> Option<String> {
        self.token.load_full().map(|t| t.as_str().to_string())
    }

    fn set_token(&self, token: &str) {
        self.token.store(Some(Arc::new(token.to_string())));
    }

    async fn login_workload(&self, role: &str, jwt: &str) -> VaultResult<Option<AccessCredential>> {
        let path = format!("auth/{}/login", self.auth_mount);
        let body = json!({ "role": role, "jwt": jwt });
        let response = self.send(Method::POST, &path, Some(&body)).await?;

        Ok(response
            .and_then(|r| r.auth)
            .filter(|auth| !auth.client_token.is_empty())
            .map(|auth| auth.into_credential(Instant::now())))
    }

    async fn renew_self(&self, increment: Duration) -> VaultResult<AccessCredential> {
        let body = json!({ "increment": increment.as_secs() });
        let response = self
            .send(Method::POST, "auth/token/renew-self", Some(&body))
            .await?;

        response
            .and_then(|r| r.auth)
            .map(|auth| auth.into_credential(Instant::now()))
            .ok_or(VaultError::MissingAuth)
    }

    async fn read(&self, path: &str) -> VaultResult<Option<Value>> {
        Ok(self
            .send(Method::GET, path, None)
            .await?
            .and_then(|r| r.data))
    }

    async fn write(&self, path: &str, body: &Value) -> VaultResult<Option<Value>> {
        Ok(self
            .send(Method::POST, path, Some(body))
            .await?
            .and_then(|r| r.data))
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address.as_str())
            .field("auth_mount", &self.auth_mount)
            .field("has_token", &self.token.load().is_some())
            .finish()
    }
}
