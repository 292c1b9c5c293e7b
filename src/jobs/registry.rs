//! Explicit job registry.
//!
//! Handlers and periodic schedules are registered on a registry object built at
//! startup and handed to the worker, so tests and multiple instances never share
//! process-wide state.

use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from job registration and execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The engine stopped because shutdown was requested.
    #[error("Job engine cancelled")]
    Cancelled,

    /// No handler registered under this name.
    #[error("Unknown job handler: {0}")]
    UnknownHandler(String),

    /// A job ran and failed.
    #[error("Job failed: {0}")]
    Failed(String),

    /// The worker is gone and no longer accepts jobs.
    #[error("Job queue closed")]
    QueueClosed,
}

impl JobError {
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }
}

/// A unit of background work.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self) -> Result<(), JobError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), JobError> {
        (self.0)().await
    }
}

/// Wrap a closure as a [`JobHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A handler scheduled on a fixed period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicJob {
    pub name: String,
    pub queue: String,
    pub handler: String,
    pub period: Duration,
}

/// Named handlers and their schedules. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: Arc<DashMap<String, Arc<dyn JobHandler>>>,
    periodic: Arc<DashMap<String, PeriodicJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a handler.
    pub fn register_handler(&self, name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Schedule `handler` every `period` on `queue` under the job name `name`.
    pub fn register_periodic(
        &self,
        name: impl Into<String>,
        queue: impl Into<String>,
        handler: impl Into<String>,
        period: Duration,
    ) -> Result<(), JobError> {
        let handler = handler.into();
        if !self.handlers.contains_key(&handler) {
            return Err(JobError::UnknownHandler(handler));
        }
        if period.is_zero() {
            return Err(JobError::failed("periodic job needs a non-zero period"));
        }

        let name = name.into();
        self.periodic.insert(
            name.clone(),
            PeriodicJob {
                name,
                queue: queue.into(),
                handler,
                period,
            },
        );
        Ok(())
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }

    /// Registered handler names, sorted.
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Periodic jobs bound to any of `queues`, sorted by name.
    pub fn periodic_jobs(&self, queues: &[String]) -> Vec<PeriodicJob> {
        let mut jobs: Vec<PeriodicJob> = self
            .periodic
            .iter()
            .filter(|e| queues.contains(&e.value().queue))
            .map(|e| e.value().clone())
            .collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    pub fn log_handlers(&self) {
        for name in self.handler_names() {
            tracing::info!(handler = %name, "Registered job handler");
        }
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("handlers", &self.handler_names())
            .field("periodic", &self.periodic.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<dyn JobHandler> {
        handler_fn(|| async { Ok(()) })
    }

    #[test]
    fn handler_names_are_sorted() {
        let registry = JobRegistry::new();
        registry.register_handler("renew-hub-tls", noop());
        registry.register_handler("cleanup-activity-log", noop());
        assert_eq!(
            registry.handler_names(),
            vec!["cleanup-activity-log".to_string(), "renew-hub-tls".to_string()]
        );
    }

    #[test]
    fn periodic_requires_known_handler() {
        let registry = JobRegistry::new();
        let err = registry
            .register_periodic("job", "default", "missing", Duration::from_secs(60))
            .unwrap_err();
        assert_eq!(err, JobError::UnknownHandler("missing".into()));

        registry.register_handler("present", noop());
        assert!(registry
            .register_periodic("job", "default", "present", Duration::ZERO)
            .is_err());
        registry
            .register_periodic("job", "default", "present", Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn periodic_jobs_filtered_by_queue() {
        let registry = JobRegistry::new();
        registry.register_handler("h", noop());
        registry
            .register_periodic("b", "default", "h", Duration::from_secs(60))
            .unwrap();
        registry
            .register_periodic("a", "default", "h", Duration::from_secs(60))
            .unwrap();
        registry
            .register_periodic("c", "other", "h", Duration::from_secs(60))
            .unwrap();

        let names: Vec<String> = registry
            .periodic_jobs(&["default".to_string()])
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn clones_share_registrations() {
        let registry = JobRegistry::new();
        let clone = registry.clone();
        clone.register_handler("shared", noop());
        assert!(registry.handler("shared").is_some());
    }
}
