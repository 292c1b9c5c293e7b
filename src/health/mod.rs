//! Health and metrics endpoint.
//!
//! # Data Flow
//! ```text
//! GET /healthz → MaterialStore populated? → 200 | 503
//! GET /metrics → Prometheus render (when a recorder is installed)
//! ```
//!
//! # Design Decisions
//! - Separate plain-HTTP listener, independent of the TLS listener's lifecycle
//! - Readiness means "serving material installed", nothing more
//! - Stops on the shared shutdown signal

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::HealthConfig;
use crate::lifecycle::ShutdownSignal;
use crate::tls::MaterialStore;

/// State shared by the health handlers.
#[derive(Clone)]
pub struct HealthState {
    pub store: Arc<MaterialStore>,
    pub metrics: Option<PrometheusHandle>,
}

async fn healthz(State(state): State<HealthState>) -> impl IntoResponse {
    if state.store.is_populated() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no serving material")
    }
}

async fn render_metrics(State(state): State<HealthState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

/// Bind the health listener and serve it in the background until shutdown.
///
/// Returns the bound address alongside the task.
pub async fn spawn(
    config: &HealthConfig,
    state: HealthState,
    mut shutdown: ShutdownSignal,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    let address = listener.local_addr()?;
    tracing::info!(address = %address, "Health endpoint listening");

    let app = router(state);
    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Health endpoint failed");
        }
        tracing::debug!("Health endpoint stopped");
    });

    Ok((address, task))
}
