//! Startup orchestration.
//!
//! # Order
//! ```text
//! secrets backend → credential bootstrap (+ renewal loop)
//!     → capability selection (cloud session, certificate source)
//!     → DNS setup (managed + cloud only)
//!     → health endpoint
//!     → initial serving material (+ refresh loop, renewal job)
//!     → job worker
//!     → TLS config → multiplexing listener
//! ```
//!
//! # Design Decisions
//! - Fail fast: any error before serving is fatal and nothing is retried
//! - Steps run sequentially; background loops start only once their inputs exist
//! - Every background task shares one shutdown signal
//! - The listener is built last so traffic arrives only when material is installed

use axum::Router;
use axum_server::Handle;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::cloud::{setup_dns, CloudError, CloudSession, ZoneClient};
use crate::config::{ConfigError, ControlConfig};
use crate::health::{self, HealthState};
use crate::http::Multiplexer;
use crate::jobs::{supervise, JobError, JobQueue, JobRegistry, Worker, WorkerExit};
use crate::lifecycle::Shutdown;
use crate::net::{self, ListenerError, MultiplexListener};
use crate::rpc;
use crate::tls::{CertError, CertificateSource, MaterialStore};
use crate::vault::{
    BootstrapError, BootstrapOutcome, CredentialBootstrapper, CredentialRenewer, SecretsBackend,
    VaultClient, VaultError,
};

/// Every condition that stops the gateway before (or while) serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secrets backend unavailable: {0}")]
    Vault(#[from] VaultError),

    #[error("Credential bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("Cloud setup failed: {0}")]
    Cloud(#[from] CloudError),

    #[error("Serving material unavailable: {0}")]
    Certificate(#[from] CertError),

    #[error("Health endpoint failed to bind: {0}")]
    Health(#[source] std::io::Error),

    #[error("Job registration failed: {0}")]
    Jobs(#[from] JobError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Services the gateway fronts but does not implement.
///
/// Anything left as `None` falls back to the built-in surface: the RPC
/// placeholder router, the admin router, no cloud session, no metrics.
#[derive(Default)]
pub struct Collaborators {
    pub rpc: Option<Router>,
    pub app: Option<Router>,
    pub zone_client: Option<Arc<dyn ZoneClient>>,
    pub metrics: Option<PrometheusHandle>,
    /// Pre-registered handlers and periodic jobs.
    pub jobs: JobRegistry,
}

/// A fully prepared gateway, ready to accept traffic.
pub struct Gateway {
    listener: MultiplexListener,
    handle: Handle,
    store: Arc<MaterialStore>,
    shutdown: Shutdown,
    background: Vec<JoinHandle<()>>,
    worker: JoinHandle<WorkerExit>,
    job_queue: JobQueue,
    health_address: Option<SocketAddr>,
}

impl Gateway {
    /// Run every startup step in order. `config` must already be validated.
    ///
    /// On failure the shutdown signal is triggered so tasks spawned by
    /// earlier steps stop with it.
    pub async fn prepare(
        config: ControlConfig,
        collaborators: Collaborators,
        shutdown: &Shutdown,
    ) -> Result<Self, StartupError> {
        let result = Self::assemble(config, collaborators, shutdown).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Startup aborted");
            shutdown.trigger();
        }
        result
    }

    async fn assemble(
        config: ControlConfig,
        collaborators: Collaborators,
        shutdown: &Shutdown,
    ) -> Result<Self, StartupError> {
        let Collaborators {
            rpc: rpc_surface,
            app: app_surface,
            zone_client,
            metrics,
            jobs,
        } = collaborators;
        let deployment = &config.deployment;
        let mut background = Vec::new();

        let backend: Arc<dyn SecretsBackend> = Arc::new(VaultClient::new(&config.vault)?);
        let bootstrapper = CredentialBootstrapper::new(backend.clone(), &config.vault);
        let outcome = bootstrapper.bootstrap().await?;
        match outcome {
            BootstrapOutcome::Exchanged(credential) => {
                let renewer = CredentialRenewer::new(bootstrapper, credential, &config.vault);
                let signal = shutdown.subscribe();
                background.push(tokio::spawn(async move { renewer.run(signal).await }));
            }
            outcome => tracing::debug!(?outcome, "No credential renewal needed"),
        }

        let store = Arc::new(MaterialStore::new());
        let source = CertificateSource::resolve(deployment, &config.tls, backend, store.clone());
        let cloud = CloudSession::resolve(deployment.use_cloud, source.is_managed(), zone_client)?;
        tracing::info!(
            managed = source.is_managed(),
            cloud = cloud.is_enabled(),
            "Capabilities resolved"
        );

        setup_dns(
            &cloud,
            source.is_managed(),
            deployment.zone_id.as_deref(),
            &deployment.domain,
        )
        .await?;

        let health_address = if config.health.enabled {
            let state = HealthState {
                store: store.clone(),
                metrics,
            };
            let (address, task) = health::spawn(&config.health, state, shutdown.subscribe())
                .await
                .map_err(StartupError::Health)?;
            background.push(task);
            Some(address)
        } else {
            None
        };

        source.populate().await?;
        if let Some(manager) = source.manager() {
            let refresher = manager.clone();
            let signal = shutdown.subscribe();
            background.push(tokio::spawn(async move {
                refresher.run_refresh_loop(signal).await
            }));
            manager.register_renewal(
                &jobs,
                Duration::from_secs(config.tls.renew_check_interval_secs),
            )?;
        }

        jobs.log_handlers();
        let (worker, job_queue) = Worker::new(jobs, config.jobs.queues.clone());
        let worker = supervise(worker, shutdown.subscribe());

        let rpc = rpc_surface.unwrap_or_else(rpc::router);
        let app = app_surface.unwrap_or_else(|| {
            admin::router(AdminState {
                store: store.clone(),
                ops_token: Arc::from(deployment.ops_token.as_str()),
                image_tag: deployment.image_tag.clone(),
            })
        });
        let router = Multiplexer::new(rpc, app).into_router();

        let tls = net::tls::rustls_config(store.clone())?;
        let listener = MultiplexListener::new(&config.listener, tls, router)?;
        tracing::info!(address = %listener.address(), "Listener prepared");

        Ok(Self {
            listener,
            handle: Handle::new(),
            store,
            shutdown: shutdown.clone(),
            background,
            worker,
            job_queue,
            health_address,
        })
    }

    pub fn store(&self) -> &Arc<MaterialStore> {
        &self.store
    }

    /// Server handle; `listening()` resolves to the bound address once serving.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn health_address(&self) -> Option<SocketAddr> {
        self.health_address
    }

    pub fn job_queue(&self) -> JobQueue {
        self.job_queue.clone()
    }

    /// Accept until shutdown, then stop every background task.
    pub async fn serve(self) -> Result<(), StartupError> {
        let Self {
            listener,
            handle,
            shutdown,
            background,
            worker,
            ..
        } = self;

        let result = listener.serve(handle, shutdown.subscribe()).await;
        shutdown.trigger();

        for task in background {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
        match worker.await {
            Ok(exit) => tracing::debug!(?exit, "Job worker finished"),
            Err(e) => tracing::warn!(error = %e, "Job worker ended abnormally"),
        }

        result?;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Prepare the gateway and serve until `shutdown` fires.
pub async fn launch(
    config: ControlConfig,
    collaborators: Collaborators,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    Gateway::prepare(config, collaborators, &shutdown)
        .await?
        .serve()
        .await
}
