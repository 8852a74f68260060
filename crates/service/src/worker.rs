//! Cooperative worker runtime: poll, dispatch, retry, dead-letter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;

use triage_core::compute_retry_delay;
use triage_storage::{JobQueueStore, JobRecord};

use crate::error::ServiceError;
use crate::job_failure::JobFailureService;

const DEFAULT_CLAIM_LIMIT: i64 = 10;

/// One job type's handler.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &JobRecord) -> Result<(), ServiceError>;
}

/// Job-type to handler dispatch table.
pub type HandlerMap = HashMap<String, Arc<dyn JobHandler>>;

/// Single-process cooperative poller.
///
/// Ordering between jobs is not promised; correctness rests on the queue's
/// atomic claim and on handlers short-circuiting on wrong case state.
pub struct WorkerRuntime {
    queue: Arc<dyn JobQueueStore>,
    handlers: HandlerMap,
    failure_finalizer: Option<Arc<JobFailureService>>,
    poll_interval: Duration,
    claim_limit: i64,
}

impl WorkerRuntime {
    pub fn new(queue: Arc<dyn JobQueueStore>, handlers: HandlerMap) -> Self {
        Self {
            queue,
            handlers,
            failure_finalizer: None,
            poll_interval: Duration::from_secs(1),
            claim_limit: DEFAULT_CLAIM_LIMIT,
        }
    }

    #[must_use]
    pub fn with_failure_finalizer(mut self, finalizer: Arc<JobFailureService>) -> Self {
        self.failure_finalizer = Some(finalizer);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Claim one due batch and run it serially. Returns the claimed count.
    pub async fn run_once(&self) -> Result<usize, ServiceError> {
        let jobs = self.queue.claim_due(self.claim_limit).await?;
        let claimed = jobs.len();
        for job in jobs {
            self.process_job(job).await?;
        }
        Ok(claimed)
    }

    /// Poll until the stop signal flips; in-flight batches complete first.
    pub async fn run_until_stopped(
        &self,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), ServiceError> {
        tracing::info!("worker runtime started");
        loop {
            if *stop.borrow() {
                break;
            }
            let claimed = self.run_once().await?;
            if claimed == 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = stop.changed() => {}
                }
            }
        }
        tracing::info!("worker runtime stopped");
        Ok(())
    }

    async fn process_job(&self, job: JobRecord) -> Result<(), ServiceError> {
        let outcome = match self.handlers.get(&job.job_type) {
            Some(handler) => handler.handle(&job).await,
            None => Err(ServiceError::UnknownJobType(job.job_type.clone())),
        };

        match outcome {
            Ok(()) => {
                self.queue.mark_done(job.job_id).await?;
                tracing::debug!(job_id = job.job_id, job_type = %job.job_type, "job done");
            }
            Err(error) => {
                let message = error.to_string();
                let next_attempt = job.attempts + 1;
                if next_attempt < job.max_attempts {
                    let delay = compute_retry_delay(next_attempt as u32);
                    let run_after = Utc::now()
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::seconds(30));
                    self.queue.schedule_retry(job.job_id, run_after, &message).await?;
                    tracing::warn!(
                        job_id = job.job_id,
                        job_type = %job.job_type,
                        attempt = next_attempt,
                        delay_secs = delay.as_secs(),
                        error = %message,
                        "job failed, retry scheduled"
                    );
                } else {
                    let dead = self.queue.mark_dead(job.job_id, &message).await?;
                    tracing::error!(
                        job_id = job.job_id,
                        job_type = %job.job_type,
                        attempts = dead.attempts,
                        error = %message,
                        "job dead-lettered"
                    );
                    if let Some(finalizer) = &self.failure_finalizer {
                        finalizer.handle_max_retries(&dead).await?;
                    }
                }
            }
        }
        Ok(())
    }
}
