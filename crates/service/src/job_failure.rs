//! Failure finalization for jobs that exhausted their retries.

use std::sync::Arc;

use serde_json::json;

use triage_core::CaseStatus;
use triage_storage::{AuditStore, CaseStore, JobQueueStore, JobRecord, NewAuditEvent, NewJob, job_type};

use crate::error::{ServiceError, categorize_failure};

const MAX_FAILURE_DETAILS_CHARS: usize = 300;

/// Move a case to FAILED after dead-lettering and enqueue the failure reply.
pub struct JobFailureService {
    cases: Arc<dyn CaseStore>,
    audit: Arc<dyn AuditStore>,
    queue: Arc<dyn JobQueueStore>,
}

impl JobFailureService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        audit: Arc<dyn AuditStore>,
        queue: Arc<dyn JobQueueStore>,
    ) -> Self {
        Self { cases, audit, queue }
    }

    pub async fn handle_max_retries(&self, job: &JobRecord) -> Result<(), ServiceError> {
        let Some(case_id) = job.case_id else {
            return Ok(());
        };

        // The failure reply job itself may dead-letter; re-finalizing would
        // loop forever.
        if job.job_type == job_type::POST_ROOM1_FINAL_FAILURE {
            tracing::error!(case_id = %case_id, "failure reply job dead-lettered, giving up");
            return Ok(());
        }

        self.cases.update_status(case_id, CaseStatus::Failed).await?;
        self.audit
            .append_event(NewAuditEvent::system(
                case_id,
                "CASE_FAILED_MAX_RETRIES",
                json!({
                    "job_type": job.job_type,
                    "attempts": job.attempts,
                    "last_error": job.last_error,
                }),
            ))
            .await?;

        let details: String = job
            .last_error
            .as_deref()
            .unwrap_or("unknown error")
            .chars()
            .take(MAX_FAILURE_DETAILS_CHARS)
            .collect();
        let failure_payload = json!({
            "cause": categorize_failure(job.last_error.as_deref()),
            "details": details,
        });

        if !self.queue.has_active_job(case_id, job_type::POST_ROOM1_FINAL_FAILURE).await? {
            self.queue
                .enqueue(NewJob::now(
                    job_type::POST_ROOM1_FINAL_FAILURE,
                    Some(case_id),
                    failure_payload,
                ))
                .await?;
            self.audit
                .append_event(NewAuditEvent::system(
                    case_id,
                    "JOB_ENQUEUED_POST_ROOM1_FAILURE",
                    json!({"job_type": job_type::POST_ROOM1_FINAL_FAILURE}),
                ))
                .await?;
        }

        Ok(())
    }
}
