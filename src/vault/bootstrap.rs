//! Workload identity exchange and credential renewal.
//!
//! # Responsibilities
//! - Decide whether an exchange is needed (ambient token, identity file present or not)
//! - Exchange the mounted identity token for an [`AccessCredential`]
//! - Keep the credential alive on a fixed interval, re-authenticating once the lease lapsed

use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;

use crate::config::VaultConfig;
use crate::lifecycle::{run_periodic, ShutdownSignal};
use crate::observability::metrics;
use crate::vault::client::SecretsBackend;
use crate::vault::types::{AccessCredential, VaultError};

/// Errors raised while obtaining or keeping a credential.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The identity file exists but its content could not be read.
    #[error("Identity token at {} could not be read: {source}", path.display())]
    IdentityUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Re-authentication was needed but the identity file is gone.
    #[error("Identity token at {} is missing", .0.display())]
    IdentityMissing(PathBuf),

    /// The login call itself failed.
    #[error("Workload login failed: {0}")]
    Login(#[source] VaultError),

    /// The login call succeeded without issuing a credential.
    #[error("Workload login returned no credential")]
    NoCredential,

    /// Self-renewal failed while the lease was still valid.
    #[error("Credential renewal failed: {0}")]
    Renewal(#[source] VaultError),
}

/// How the process ended up authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A token was already configured; no exchange happened.
    AmbientToken,
    /// No identity file is mounted; the deployment authenticates some other way.
    NoIdentity,
    /// The identity token was exchanged for a fresh credential.
    Exchanged(AccessCredential),
}

/// Exchanges the mounted workload identity for a backend credential.
#[derive(Clone)]
pub struct CredentialBootstrapper {
    backend: Arc<dyn SecretsBackend>,
    identity_path: PathBuf,
    role: String,
}

impl CredentialBootstrapper {
    pub fn new(backend: Arc<dyn SecretsBackend>, config: &VaultConfig) -> Self {
        Self {
            backend,
            identity_path: PathBuf::from(&config.identity_token_path),
            role: config.role.clone(),
        }
    }

    pub fn identity_path(&self) -> &Path {
        &self.identity_path
    }

    /// Run the startup protocol.
    ///
    /// A missing identity file is not an error. An unreadable one, a failed login, or a
    /// login that issues nothing are all fatal to startup.
    pub async fn bootstrap(&self) -> Result<BootstrapOutcome, BootstrapError> {
        if self.backend.token().is_some() {
            tracing::info!("Secrets backend token already present, skipping identity exchange");
            return Ok(BootstrapOutcome::AmbientToken);
        }

        match self.exchange().await? {
            Some(credential) => Ok(BootstrapOutcome::Exchanged(credential)),
            None => {
                tracing::info!(
                    path = %self.identity_path.display(),
                    "No workload identity token mounted, proceeding without credential"
                );
                Ok(BootstrapOutcome::NoIdentity)
            }
        }
    }

    /// Exchange the identity token, installing the resulting token on the backend.
    ///
    /// Returns `Ok(None)` when no identity file is mounted.
    pub async fn exchange(&self) -> Result<Option<AccessCredential>, BootstrapError> {
        let Some(jwt) = self.read_identity().await? else {
            return Ok(None);
        };

        let credential = self
            .backend
            .login_workload(&self.role, &jwt)
            .await
            .map_err(BootstrapError::Login)?
            .ok_or(BootstrapError::NoCredential)?;

        self.backend.set_token(&credential.token);

        tracing::info!(
            role = %self.role,
            accessor = credential.accessor.as_deref().unwrap_or("-"),
            lease_secs = credential.lease_duration.as_secs(),
            renewable = credential.renewable,
            "Workload identity exchanged for access credential"
        );

        Ok(Some(credential))
    }

    async fn read_identity(&self) -> Result<Option<String>, BootstrapError> {
        // Failing to open means absent; failing after the open means unreadable.
        let mut file = match tokio::fs::File::open(&self.identity_path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(
                    path = %self.identity_path.display(),
                    error = %e,
                    "Identity token not available"
                );
                return Ok(None);
            }
        };

        let mut content = String::new();
        file.read_to_string(&mut content)
            .await
            .map_err(|source| BootstrapError::IdentityUnreadable {
                path: self.identity_path.clone(),
                source,
            })?;

        Ok(Some(content.trim().to_string()))
    }
}

/// What a single renewal tick achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewOutcome {
    Renewed,
    Reauthenticated,
}

/// Keeps an exchanged credential alive.
pub struct CredentialRenewer {
    backend: Arc<dyn SecretsBackend>,
    bootstrapper: CredentialBootstrapper,
    credential: ArcSwap<AccessCredential>,
    interval: Duration,
    increment: Duration,
}

impl CredentialRenewer {
    pub fn new(
        bootstrapper: CredentialBootstrapper,
        credential: AccessCredential,
        config: &VaultConfig,
    ) -> Self {
        Self {
            backend: bootstrapper.backend.clone(),
            bootstrapper,
            credential: ArcSwap::from_pointee(credential),
            interval: Duration::from_secs(config.renew_interval_secs),
            increment: Duration::from_secs(config.lease_increment_secs),
        }
    }

    /// Credential as of the last successful renewal or exchange.
    pub fn credential(&self) -> Arc<AccessCredential> {
        self.credential.load_full()
    }

    /// One renewal attempt.
    ///
    /// If renewal fails after the lease has already lapsed, the identity exchange is run
    /// again. Every failure leaves the held credential unchanged.
    pub async fn renew_once(&self) -> Result<RenewOutcome, BootstrapError> {
        let err = match self.backend.renew_self(self.increment).await {
            Ok(renewed) => {
                tracing::info!(
                    lease_secs = renewed.lease_duration.as_secs(),
                    "Access credential renewed"
                );
                metrics::record_credential_renewal(true);
                self.credential.store(Arc::new(renewed));
                return Ok(RenewOutcome::Renewed);
            }
            Err(e) => e,
        };

        metrics::record_credential_renewal(false);

        if !self.credential.load().is_expired(Instant::now()) {
            tracing::warn!(error = %err, "Credential renewal failed, retrying next tick");
            return Err(BootstrapError::Renewal(err));
        }

        tracing::warn!(
            error = %err,
            "Credential renewal failed past the lease boundary, re-running identity exchange"
        );

        let result = match self.bootstrapper.exchange().await {
            Ok(Some(credential)) => {
                self.credential.store(Arc::new(credential));
                Ok(RenewOutcome::Reauthenticated)
            }
            Ok(None) => Err(BootstrapError::IdentityMissing(
                self.bootstrapper.identity_path.clone(),
            )),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::error!(
                error = %e,
                "Re-authentication failed, secrets backend calls will fail"
            );
        }
        result
    }

    /// Renew every interval until shutdown.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        let this = self;
        run_periodic("credential-renewal", self.interval, shutdown, move || async move {
            let _ = this.renew_once().await;
        })
        .await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::vault::types::VaultResult;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::Mutex;

    /// In-memory backend scripted with queued responses.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub token: Mutex<Option<String>>,
        pub logins: Mutex<VecDeque<VaultResult<Option<AccessCredential>>>>,
        pub renewals: Mutex<VecDeque<VaultResult<AccessCredential>>>,
        pub login_calls: Mutex<Vec<(String, String)>>,
        pub renew_calls: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl SecretsBackend for FakeBackend {
        fn token(&self) -> Option<String> {
            self.token.lock().unwrap().clone()
        }

        fn set_token(&self, token: &str) {
            *self.token.lock().unwrap() = Some(token.to_string());
        }

        async fn login_workload(
            &self,
            role: &str,
            jwt: &str,
        ) -> VaultResult<Option<AccessCredential>> {
            self.login_calls
                .lock()
                .unwrap()
                .push((role.to_string(), jwt.to_string()));
            self.logins.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        async fn renew_self(&self, increment: Duration) -> VaultResult<AccessCredential> {
            self.renew_calls.lock().unwrap().push(increment);
            self.renewals
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(VaultError::MissingAuth))
        }

        async fn read(&self, _path: &str) -> VaultResult<Option<Value>> {
            Ok(None)
        }

        async fn write(&self, _path: &str, _body: &Value) -> VaultResult<Option<Value>> {
            Ok(None)
        }
    }

    pub(crate) fn credential(token: &str, lease_secs: u64) -> AccessCredential {
        AccessCredential {
            token: token.to_string(),
            accessor: Some(format!("{}-accessor", token)),
            issued_at: Instant::now(),
            lease_duration: Duration::from_secs(lease_secs),
            renewable: true,
        }
    }

    fn config(identity_path: &Path) -> VaultConfig {
        VaultConfig {
            identity_token_path: identity_path.display().to_string(),
            ..VaultConfig::default()
        }
    }

    fn identity_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[tokio::test]
    async fn missing_identity_skips_login() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let bootstrapper =
            CredentialBootstrapper::new(backend.clone(), &config(&dir.path().join("token")));

        let outcome = bootstrapper.bootstrap().await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::NoIdentity);
        assert!(backend.login_calls.lock().unwrap().is_empty());
        assert!(backend.token().is_none());
    }

    #[tokio::test]
    async fn ambient_token_skips_exchange() {
        let file = identity_file("jwt");
        let backend = Arc::new(FakeBackend::default());
        backend.set_token("s.preprovisioned");

        let bootstrapper = CredentialBootstrapper::new(backend.clone(), &config(file.path()));
        assert_eq!(
            bootstrapper.bootstrap().await.unwrap(),
            BootstrapOutcome::AmbientToken
        );
        assert!(backend.login_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exchange_installs_token() {
        let file = identity_file("  header.payload.sig\n");
        let backend = Arc::new(FakeBackend::default());
        backend
            .logins
            .lock()
            .unwrap()
            .push_back(Ok(Some(credential("s.exchanged", 3600))));

        let bootstrapper = CredentialBootstrapper::new(backend.clone(), &config(file.path()));
        let outcome = bootstrapper.bootstrap().await.unwrap();

        match outcome {
            BootstrapOutcome::Exchanged(c) => assert_eq!(c.token, "s.exchanged"),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(backend.token().as_deref(), Some("s.exchanged"));
        assert_eq!(
            backend.login_calls.lock().unwrap().as_slice(),
            &[("horizon".to_string(), "header.payload.sig".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_login_is_fatal() {
        let file = identity_file("jwt");
        let backend = Arc::new(FakeBackend::default());
        backend.logins.lock().unwrap().push_back(Ok(None));

        let bootstrapper = CredentialBootstrapper::new(backend.clone(), &config(file.path()));
        let err = bootstrapper.bootstrap().await.unwrap_err();
        assert!(matches!(err, BootstrapError::NoCredential));
        assert!(backend.token().is_none());
    }

    #[tokio::test]
    async fn failed_login_is_fatal() {
        let file = identity_file("jwt");
        let backend = Arc::new(FakeBackend::default());
        backend.logins.lock().unwrap().push_back(Err(VaultError::Status {
            status: 403,
            errors: "permission denied".into(),
        }));

        let bootstrapper = CredentialBootstrapper::new(backend, &config(file.path()));
        let err = bootstrapper.bootstrap().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Login(_)));
    }

    #[tokio::test]
    async fn unreadable_identity_is_fatal() {
        // A directory opens on unix but cannot be read as a file.
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let bootstrapper = CredentialBootstrapper::new(backend.clone(), &config(dir.path()));

        let err = bootstrapper.bootstrap().await.unwrap_err();
        assert!(matches!(err, BootstrapError::IdentityUnreadable { .. }));
        assert!(backend.login_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn renewal_failure_keeps_credential() {
        let file = identity_file("jwt");
        let backend = Arc::new(FakeBackend::default());
        let bootstrapper = CredentialBootstrapper::new(backend.clone(), &config(file.path()));
        let renewer = CredentialRenewer::new(
            bootstrapper,
            credential("s.current", 86_400),
            &VaultConfig::default(),
        );

        backend.renewals.lock().unwrap().push_back(Err(VaultError::Status {
            status: 500,
            errors: "sealed".into(),
        }));

        let err = renewer.renew_once().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Renewal(_)));
        assert_eq!(renewer.credential().token, "s.current");
        assert!(backend.login_calls.lock().unwrap().is_empty());
        assert_eq!(
            backend.renew_calls.lock().unwrap().as_slice(),
            &[Duration::from_secs(86_400)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lapsed_lease_triggers_reauthentication() {
        let file = identity_file("jwt");
        let backend = Arc::new(FakeBackend::default());
        let bootstrapper = CredentialBootstrapper::new(backend.clone(), &config(file.path()));
        let renewer =
            CredentialRenewer::new(bootstrapper, credential("s.old", 60), &VaultConfig::default());

        tokio::time::advance(Duration::from_secs(120)).await;

        backend
            .renewals
            .lock()
            .unwrap()
            .push_back(Err(VaultError::MissingAuth));
        backend
            .logins
            .lock()
            .unwrap()
            .push_back(Ok(Some(credential("s.new", 3600))));

        assert_eq!(renewer.renew_once().await.unwrap(), RenewOutcome::Reauthenticated);
        assert_eq!(renewer.credential().token, "s.new");
        assert_eq!(backend.token().as_deref(), Some("s.new"));
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_loop_ticks_until_shutdown() {
        let file = identity_file("jwt");
        let backend = Arc::new(FakeBackend::default());
        let bootstrapper = CredentialBootstrapper::new(backend.clone(), &config(file.path()));
        let renewer = Arc::new(CredentialRenewer::new(
            bootstrapper,
            credential("s.token", 86_400),
            &VaultConfig::default(),
        ));

        for _ in 0..2 {
            backend
                .renewals
                .lock()
                .unwrap()
                .push_back(Ok(credential("s.token", 86_400)));
        }

        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        let task = {
            let renewer = renewer.clone();
            tokio::spawn(async move { renewer.run(signal).await })
        };

        tokio::time::sleep(Duration::from_secs(2 * 3600 + 1)).await;
        assert_eq!(backend.renew_calls.lock().unwrap().len(), 2);

        shutdown.trigger();
        task.await.unwrap();
    }
}
