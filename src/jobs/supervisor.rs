//! Background worker supervision.
//!
//! The engine runs independently of the listener: cancellation is a clean exit and
//! any other failure is logged, never escalated.

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::jobs::registry::JobError;
use crate::lifecycle::ShutdownSignal;

/// A long-running job execution engine.
#[async_trait]
pub trait JobEngine: Send {
    /// Run until shutdown (`Err(JobError::Cancelled)`) or failure.
    async fn run(&mut self, shutdown: ShutdownSignal) -> Result<(), JobError>;
}

/// How the supervised engine ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Clean,
    Cancelled,
    Failed(String),
}

/// Spawn `engine` bound to `shutdown`.
pub fn supervise<E>(mut engine: E, shutdown: ShutdownSignal) -> JoinHandle<WorkerExit>
where
    E: JobEngine + 'static,
{
    tokio::spawn(async move {
        tracing::info!("Starting background worker");
        match engine.run(shutdown).await {
            Ok(()) => {
                tracing::info!("Background worker exited");
                WorkerExit::Clean
            }
            Err(JobError::Cancelled) => {
                tracing::debug!("Background worker cancelled");
                WorkerExit::Cancelled
            }
            Err(e) => {
                tracing::error!(error = %e, "Background worker errored out");
                WorkerExit::Failed(e.to_string())
            }
        }
    })
}
