//! Managed certificate sources.
//!
//! # Responsibilities
//! - Fetch the current certificate for the serving domain from the managed system
//! - Issue a new certificate and store it where `fetch` will find it
//!
//! # Storage Layout
//! ```text
//! KV v2:  <kv_mount>/data/<kv_prefix>/<staging|production>/<domain>
//!         { certificate: <PEM chain>, private_key: <PEM> }
//! PKI:    <pki_mount>/issue/<pki_role>   (staging toggle selects the staging mount)
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::{DeploymentConfig, TlsConfig};
use crate::tls::error::{CertError, CertResult};
use crate::tls::material::ServingCertificate;
use crate::vault::SecretsBackend;

/// A system that can hand out and rotate serving certificates.
#[async_trait]
pub trait CertificateProvider: Send + Sync {
    /// Domain the material is served for.
    fn domain(&self) -> &str;

    /// Current material as stored by the managed system.
    async fn fetch(&self) -> CertResult<ServingCertificate>;

    /// Issue fresh material so the next `fetch` returns it.
    async fn renew(&self) -> CertResult<()>;
}

/// Strip a leading wildcard label: `*.hub.example.com` serves `hub.example.com`.
pub fn serving_domain(domain: &str) -> &str {
    domain.strip_prefix("*.").unwrap_or(domain)
}

/// [`CertificateProvider`] over the secrets backend's KV and PKI engines.
pub struct VaultCertificateProvider {
    backend: Arc<dyn SecretsBackend>,
    common_name: String,
    domain: String,
    read_path: String,
    write_path: String,
    issue_path: String,
    ttl: String,
}

impl VaultCertificateProvider {
    pub fn new(
        backend: Arc<dyn SecretsBackend>,
        deployment: &DeploymentConfig,
        tls: &TlsConfig,
    ) -> Self {
        let domain = serving_domain(&deployment.domain).to_string();
        let environment = if deployment.staging {
            "staging"
        } else {
            "production"
        };
        let pki_mount = if deployment.staging {
            &tls.staging_pki_mount
        } else {
            &tls.pki_mount
        };

        let read_path = format!(
            "{}/data/{}/{}/{}",
            tls.kv_mount.trim_matches('/'),
            tls.kv_prefix.trim_matches('/'),
            environment,
            domain
        );

        Self {
            backend,
            common_name: deployment.domain.clone(),
            write_path: read_path.clone(),
            read_path,
            issue_path: format!("{}/issue/{}", pki_mount.trim_matches('/'), tls.pki_role),
            ttl: tls.issue_ttl.clone(),
            domain,
        }
    }

    /// KV path the current material is read from and written to.
    pub fn storage_path(&self) -> &str {
        &self.read_path
    }

    /// PKI path used for issuance.
    pub fn issue_path(&self) -> &str {
        &self.issue_path
    }

    fn malformed(&self, path: &str, reason: impl Into<String>) -> CertError {
        CertError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

fn string_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[async_trait]
impl CertificateProvider for VaultCertificateProvider {
    fn domain(&self) -> &str {
        &self.domain
    }

    async fn fetch(&self) -> CertResult<ServingCertificate> {
        let record = self
            .backend
            .read(&self.read_path)
            .await?
            .ok_or_else(|| CertError::NotIssued(self.domain.clone()))?;

        // KV v2 nests the stored document under a second `data` key.
        let document = record
            .get("data")
            .ok_or_else(|| self.malformed(&self.read_path, "missing data section"))?;

        let certificate = string_field(document, "certificate")
            .ok_or_else(|| self.malformed(&self.read_path, "missing certificate"))?;
        let private_key = string_field(document, "private_key")
            .ok_or_else(|| self.malformed(&self.read_path, "missing private_key"))?;

        ServingCertificate::from_pem(certificate, private_key, self.domain.clone())
    }

    async fn renew(&self) -> CertResult<()> {
        let request = json!({
            "common_name": self.common_name,
            "alt_names": self.domain,
            "ttl": self.ttl,
        });

        let issued = self
            .backend
            .write(&self.issue_path, &request)
            .await?
            .ok_or_else(|| self.malformed(&self.issue_path, "empty issuance response"))?;

        let certificate = string_field(&issued, "certificate")
            .ok_or_else(|| self.malformed(&self.issue_path, "missing certificate"))?;
        let private_key = string_field(&issued, "private_key")
            .ok_or_else(|| self.malformed(&self.issue_path, "missing private_key"))?;

        let mut chain = certificate.trim_end().to_string();
        if let Some(ca) = string_field(&issued, "issuing_ca") {
            chain.push('\n');
            chain.push_str(ca.trim_end());
        }
        chain.push('\n');

        // Never store something that would fail the next fetch.
        let parsed = ServingCertificate::from_pem(&chain, private_key, self.domain.clone())?;

        self.backend
            .write(
                &self.write_path,
                &json!({ "data": { "certificate": chain, "private_key": private_key } }),
            )
            .await?;

        tracing::info!(
            domain = %self.domain,
            common_name = %self.common_name,
            not_after = %parsed.not_after(),
            "Issued and stored new certificate"
        );
        Ok(())
    }
}
