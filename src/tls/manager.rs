//! Certificate lifecycle manager.
//!
//! # Responsibilities
//! - Populate the material store before the listener starts
//! - Refresh on a fixed interval; a failed refresh keeps the current material
//! - Renew through the provider when expiry is near
//!
//! # Design Decisions
//! - First boot with nothing issued yet renews once, then fetches again
//! - Material outside its validity window is never installed
//! - The certificate source is resolved once at startup into a sum type

use rustls::sign::CertifiedKey;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use crate::config::{DeploymentConfig, TlsConfig, MAX_SELF_SIGNED_VALIDITY_DAYS};
use crate::jobs::{handler_fn, JobError, JobRegistry, DEFAULT_QUEUE, RENEW_CERTIFICATE_JOB};
use crate::lifecycle::{run_periodic, ShutdownSignal};
use crate::observability::metrics;
use crate::tls::error::{CertError, CertResult};
use crate::tls::material::{MaterialStore, ServingCertificate, Snapshot};
use crate::tls::provider::{CertificateProvider, VaultCertificateProvider};
use crate::tls::self_signed;
use crate::vault::SecretsBackend;

/// Keeps managed material in the store fresh.
pub struct CertificateManager {
    provider: Arc<dyn CertificateProvider>,
    store: Arc<MaterialStore>,
    refresh_interval: Duration,
    renew_before: time::Duration,
}

impl CertificateManager {
    pub fn new(
        provider: Arc<dyn CertificateProvider>,
        store: Arc<MaterialStore>,
        config: &TlsConfig,
    ) -> Self {
        Self {
            provider,
            store,
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            renew_before: time::Duration::days(i64::from(config.renew_before_days)),
        }
    }

    pub fn store(&self) -> &Arc<MaterialStore> {
        &self.store
    }

    pub fn domain(&self) -> &str {
        self.provider.domain()
    }

    /// Fetch and install the material the listener starts with.
    pub async fn initial_material(&self) -> CertResult<Arc<Snapshot>> {
        let certificate = match self.provider.fetch().await {
            Ok(certificate) => certificate,
            Err(CertError::NotIssued(domain)) => {
                tracing::info!(domain = %domain, "No certificate issued yet, requesting one");
                self.provider.renew().await?;
                self.provider.fetch().await?
            }
            Err(e) => return Err(e),
        };

        let snapshot = self.install(certificate)?;
        tracing::info!(
            domain = %snapshot.domain(),
            not_before = %snapshot.certificate().not_before(),
            not_after = %snapshot.certificate().not_after(),
            "Initial serving material installed"
        );
        Ok(snapshot)
    }

    /// Re-fetch and install; on failure the store keeps its current value.
    pub async fn refresh(&self) -> CertResult<Arc<Snapshot>> {
        let result = match self.provider.fetch().await {
            Ok(certificate) => self.install(certificate),
            Err(e) => Err(e),
        };

        match &result {
            Ok(snapshot) => {
                metrics::record_certificate_refresh(true);
                tracing::info!(
                    domain = %snapshot.domain(),
                    not_after = %snapshot.certificate().not_after(),
                    "Serving material refreshed"
                );
            }
            Err(e) => {
                metrics::record_certificate_refresh(false);
                tracing::warn!(
                    domain = %self.domain(),
                    error = %e,
                    "Certificate refresh failed, keeping current material"
                );
            }
        }
        result
    }

    /// Handshake-ready form of the installed material.
    pub fn full_certificate(&self) -> CertResult<Arc<CertifiedKey>> {
        self.store.certified_key().ok_or(CertError::NoMaterial)
    }

    /// Renew when the installed certificate expires within the configured margin.
    ///
    /// Returns whether a renewal happened.
    pub async fn renew_if_due(&self) -> CertResult<bool> {
        let now = OffsetDateTime::now_utc();
        let due = match self.store.get() {
            Some(snapshot) => snapshot.certificate().not_after() - now <= self.renew_before,
            None => true,
        };

        if !due {
            tracing::debug!(domain = %self.domain(), "Certificate not due for renewal");
            return Ok(false);
        }

        tracing::info!(domain = %self.domain(), "Certificate due for renewal");
        self.provider.renew().await?;
        self.refresh().await?;
        Ok(true)
    }

    /// Refresh every interval until shutdown.
    pub async fn run_refresh_loop(&self, shutdown: ShutdownSignal) {
        let this = self;
        run_periodic("certificate-refresh", self.refresh_interval, shutdown, move || async move {
            let _ = this.refresh().await;
        })
        .await;
    }

    /// Register the renewal check as a periodic job on the default queue.
    pub fn register_renewal(
        self: &Arc<Self>,
        registry: &JobRegistry,
        period: Duration,
    ) -> Result<(), JobError> {
        let manager = self.clone();
        registry.register_handler(
            RENEW_CERTIFICATE_JOB,
            handler_fn(move || {
                let manager = manager.clone();
                async move {
                    manager
                        .renew_if_due()
                        .await
                        .map(|_| ())
                        .map_err(JobError::failed)
                }
            }),
        );
        registry.register_periodic(
            RENEW_CERTIFICATE_JOB,
            DEFAULT_QUEUE,
            RENEW_CERTIFICATE_JOB,
            period,
        )
    }

    fn install(&self, certificate: ServingCertificate) -> CertResult<Arc<Snapshot>> {
        if !certificate.is_current_at(OffsetDateTime::now_utc()) {
            return Err(CertError::OutsideValidity {
                domain: certificate.domain().to_string(),
                not_before: certificate.not_before(),
                not_after: certificate.not_after(),
            });
        }

        let snapshot = self.store.set(certificate)?;
        metrics::record_certificate_expiry(snapshot.certificate().not_after().unix_timestamp());
        Ok(snapshot)
    }
}

/// Where serving material comes from, decided once at startup.
pub enum CertificateSource {
    /// Fetched and rotated by the managed system.
    Managed(Arc<CertificateManager>),
    /// Generated locally, never rotated.
    SelfSigned {
        common_name: String,
        validity: Duration,
        store: Arc<MaterialStore>,
    },
}

impl CertificateSource {
    /// Select the source from the deployment toggles. Either way, material lands in `store`.
    pub fn resolve(
        deployment: &DeploymentConfig,
        tls: &TlsConfig,
        backend: Arc<dyn SecretsBackend>,
        store: Arc<MaterialStore>,
    ) -> Self {
        if deployment.use_tls_manager {
            let provider = Arc::new(VaultCertificateProvider::new(backend, deployment, tls));
            Self::Managed(Arc::new(CertificateManager::new(provider, store, tls)))
        } else {
            let days = tls
                .self_signed_validity_days
                .min(MAX_SELF_SIGNED_VALIDITY_DAYS);
            Self::SelfSigned {
                common_name: tls.self_signed_common_name.clone(),
                validity: Duration::from_secs(days * 24 * 3600),
                store,
            }
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed(_))
    }

    pub fn manager(&self) -> Option<&Arc<CertificateManager>> {
        match self {
            Self::Managed(manager) => Some(manager),
            Self::SelfSigned { .. } => None,
        }
    }

    /// Store the material resolved into.
    pub fn store(&self) -> &Arc<MaterialStore> {
        match self {
            Self::Managed(manager) => manager.store(),
            Self::SelfSigned { store, .. } => store,
        }
    }

    /// Install initial material and return its handshake-ready form.
    pub async fn populate(&self) -> CertResult<Arc<CertifiedKey>> {
        match self {
            Self::Managed(manager) => {
                manager.initial_material().await?;
                manager.full_certificate()
            }
            Self::SelfSigned {
                common_name,
                validity,
                store,
            } => {
                let generated = self_signed::generate_with_validity(common_name, *validity)?;
                let snapshot = store.set(generated.certificate)?;
                tracing::warn!(
                    common_name = %common_name,
                    not_after = %snapshot.certificate().not_after(),
                    "Serving self-signed fallback certificate"
                );
                Ok(snapshot.certified_key().clone())
            }
        }
    }
}
