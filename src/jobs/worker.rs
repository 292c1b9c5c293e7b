//! Job execution engine.
//!
//! # Responsibilities
//! - Run every periodic job bound to the worker's queues
//! - Run jobs enqueued at runtime through [`JobQueue`]
//! - Stop on shutdown, reporting `Cancelled`

use async_trait::async_trait;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::jobs::registry::{JobError, JobRegistry, PeriodicJob};
use crate::jobs::supervisor::JobEngine;
use crate::lifecycle::{run_periodic, ShutdownSignal};
use crate::observability::metrics;

const QUEUE_CAPACITY: usize = 64;

struct Enqueued {
    queue: String,
    handler: String,
}

/// Handle for submitting ad-hoc jobs to a running worker.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Enqueued>,
}

impl JobQueue {
    pub async fn enqueue(&self, queue: &str, handler: &str) -> Result<(), JobError> {
        self.tx
            .send(Enqueued {
                queue: queue.to_string(),
                handler: handler.to_string(),
            })
            .await
            .map_err(|_| JobError::QueueClosed)
    }
}

/// Worker bound to a fixed set of queues.
pub struct Worker {
    registry: JobRegistry,
    queues: Vec<String>,
    rx: mpsc::Receiver<Enqueued>,
}

impl Worker {
    pub fn new(registry: JobRegistry, queues: Vec<String>) -> (Self, JobQueue) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (
            Self {
                registry,
                queues,
                rx,
            },
            JobQueue { tx },
        )
    }
}

async fn execute(registry: &JobRegistry, job: &str, handler: &str) {
    let Some(task) = registry.handler(handler) else {
        tracing::warn!(job, handler, "Dropping job with unknown handler");
        metrics::record_job(job, false);
        return;
    };

    let started = Instant::now();
    match task.run().await {
        Ok(()) => {
            tracing::debug!(
                job,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            );
            metrics::record_job(job, true);
        }
        Err(e) => {
            tracing::error!(job, error = %e, "Job failed");
            metrics::record_job(job, false);
        }
    }
}

async fn run_schedule(registry: JobRegistry, job: PeriodicJob, shutdown: ShutdownSignal) {
    let name = job.name.clone();
    run_periodic(&name, job.period, shutdown, || {
        let registry = registry.clone();
        let job = job.clone();
        async move { execute(&registry, &job.name, &job.handler).await }
    })
    .await;
}

#[async_trait]
impl JobEngine for Worker {
    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), JobError> {
        let mut tasks = JoinSet::new();

        for job in self.registry.periodic_jobs(&self.queues) {
            tracing::info!(
                job = %job.name,
                queue = %job.queue,
                period_secs = job.period.as_secs(),
                "Scheduling periodic job"
            );
            tasks.spawn(run_schedule(self.registry.clone(), job, shutdown.clone()));
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                Some(job) = self.rx.recv() => {
                    if !self.queues.contains(&job.queue) {
                        tracing::warn!(
                            queue = %job.queue,
                            handler = %job.handler,
                            "Job for a queue this worker does not consume"
                        );
                        continue;
                    }
                    let registry = self.registry.clone();
                    tasks.spawn(async move {
                        execute(&registry, &job.handler, &job.handler).await;
                    });
                }
            }
        }

        // Periodic loops observe the same signal; ad-hoc jobs finish their current run.
        while tasks.join_next().await.is_some() {}
        Err(JobError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::registry::handler_fn;
    use crate::jobs::supervisor::{supervise, WorkerExit};
    use crate::lifecycle::Shutdown;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting(registry: &JobRegistry, name: &str) -> Arc<AtomicU32> {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        registry.register_handler(
            name,
            handler_fn(move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        count
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_jobs_run_on_their_queue() {
        let registry = JobRegistry::new();
        let renew = counting(&registry, "renew-hub-tls");
        let other = counting(&registry, "elsewhere");
        registry
            .register_periodic(
                "renew-hub-tls",
                "default",
                "renew-hub-tls",
                Duration::from_secs(12 * 3600),
            )
            .unwrap();
        registry
            .register_periodic("elsewhere", "batch", "elsewhere", Duration::from_secs(60))
            .unwrap();

        let shutdown = Shutdown::new();
        let (worker, _queue) = Worker::new(registry, vec!["default".to_string()]);
        let handle = supervise(worker, shutdown.subscribe());

        tokio::time::sleep(Duration::from_secs(24 * 3600 + 1)).await;
        assert_eq!(renew.load(Ordering::SeqCst), 2);
        assert_eq!(other.load(Ordering::SeqCst), 0);

        shutdown.trigger();
        assert_eq!(handle.await.unwrap(), WorkerExit::Cancelled);
    }

    #[tokio::test]
    async fn enqueued_jobs_run_once() {
        let registry = JobRegistry::new();
        let count = counting(&registry, "adhoc");

        let shutdown = Shutdown::new();
        let (worker, queue) = Worker::new(registry, vec!["default".to_string()]);
        let handle = supervise(worker, shutdown.subscribe());

        queue.enqueue("default", "adhoc").await.unwrap();
        queue.enqueue("default", "missing").await.unwrap();
        queue.enqueue("batch", "adhoc").await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while count.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.trigger();
        assert_eq!(handle.await.unwrap(), WorkerExit::Cancelled);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn enqueue_after_exit_fails() {
        let shutdown = Shutdown::new();
        let (worker, queue) = Worker::new(JobRegistry::new(), vec!["default".to_string()]);
        let handle = supervise(worker, shutdown.subscribe());

        shutdown.trigger();
        handle.await.unwrap();
        assert_eq!(
            queue.enqueue("default", "anything").await,
            Err(JobError::QueueClosed)
        );
    }
}
