//! Boot-time recovery: restore missing queued work for non-terminal cases.

use std::sync::Arc;

use serde_json::json;

use triage_core::CaseStatus;
use triage_storage::{
    AuditStore, CaseRecoverySnapshot, CaseStore, JobQueueStore, NewAuditEvent, NewJob, job_type,
};

use crate::error::ServiceError;

/// Summary for a single worker boot recovery scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryResult {
    pub reset_running_jobs: u64,
    pub scanned_cases: usize,
    pub enqueued_jobs: usize,
}

/// Reconcile non-terminal cases after a restart.
pub struct RecoveryService {
    cases: Arc<dyn CaseStore>,
    audit: Arc<dyn AuditStore>,
    queue: Arc<dyn JobQueueStore>,
}

impl RecoveryService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        audit: Arc<dyn AuditStore>,
        queue: Arc<dyn JobQueueStore>,
    ) -> Self {
        Self { cases, audit, queue }
    }

    /// Reset orphaned running jobs, then enqueue each case's missing
    /// continuation job.
    pub async fn recover(&self) -> Result<RecoveryResult, ServiceError> {
        let reset_running_jobs = self.queue.reset_running_jobs().await?;
        if reset_running_jobs > 0 {
            tracing::info!(reset_running_jobs, "orphaned running jobs reset to queued");
        }

        let snapshots = self.cases.list_non_terminal_cases().await?;
        let mut enqueued = 0usize;

        for snapshot in &snapshots {
            let Some(recovery_job) = resolve_recovery_job(snapshot) else {
                continue;
            };
            if self.queue.has_active_job(snapshot.case_id, recovery_job).await? {
                continue;
            }

            let payload = if recovery_job == job_type::POST_ROOM1_FINAL_FAILURE {
                json!({
                    "cause": "other",
                    "details": "recovery enqueued missing failure finalization job",
                })
            } else {
                json!({})
            };

            self.queue
                .enqueue(NewJob::now(recovery_job, Some(snapshot.case_id), payload))
                .await?;
            self.audit
                .append_event(NewAuditEvent::system(
                    snapshot.case_id,
                    "RECOVERY_JOB_ENQUEUED",
                    json!({
                        "status": snapshot.status.as_str(),
                        "job_type": recovery_job,
                    }),
                ))
                .await?;
            enqueued += 1;
        }

        tracing::info!(
            scanned_cases = snapshots.len(),
            enqueued_jobs = enqueued,
            "recovery scan completed"
        );
        Ok(RecoveryResult {
            reset_running_jobs,
            scanned_cases: snapshots.len(),
            enqueued_jobs: enqueued,
        })
    }
}

/// Continuation job for a case stranded in a given status.
pub fn resolve_recovery_job(snapshot: &CaseRecoverySnapshot) -> Option<&'static str> {
    match snapshot.status {
        CaseStatus::R2PostWidget | CaseStatus::LlmSuggest => Some(job_type::POST_ROOM2_WIDGET),
        CaseStatus::DoctorAccepted | CaseStatus::R3PostRequest => {
            Some(job_type::POST_ROOM3_REQUEST)
        }
        CaseStatus::DoctorDenied => Some(job_type::POST_ROOM1_FINAL_DENIAL_TRIAGE),
        CaseStatus::ApptConfirmed => Some(job_type::POST_ROOM1_FINAL_APPT),
        CaseStatus::ApptDenied => Some(job_type::POST_ROOM1_FINAL_APPT_DENIED),
        CaseStatus::Failed => Some(job_type::POST_ROOM1_FINAL_FAILURE),
        CaseStatus::CleanupRunning => Some(job_type::EXECUTE_CLEANUP),
        CaseStatus::WaitR1CleanupThumbs
            if snapshot.cleanup_triggered_at.is_some()
                && snapshot.cleanup_completed_at.is_none() =>
        {
            Some(job_type::EXECUTE_CLEANUP)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot(status: CaseStatus) -> CaseRecoverySnapshot {
        CaseRecoverySnapshot {
            case_id: Uuid::new_v4(),
            status,
            cleanup_triggered_at: None,
            cleanup_completed_at: None,
        }
    }

    #[test]
    fn continuation_mapping_matches_lifecycle() {
        assert_eq!(
            resolve_recovery_job(&snapshot(CaseStatus::LlmSuggest)),
            Some(job_type::POST_ROOM2_WIDGET)
        );
        assert_eq!(
            resolve_recovery_job(&snapshot(CaseStatus::R2PostWidget)),
            Some(job_type::POST_ROOM2_WIDGET)
        );
        assert_eq!(
            resolve_recovery_job(&snapshot(CaseStatus::DoctorAccepted)),
            Some(job_type::POST_ROOM3_REQUEST)
        );
        assert_eq!(
            resolve_recovery_job(&snapshot(CaseStatus::DoctorDenied)),
            Some(job_type::POST_ROOM1_FINAL_DENIAL_TRIAGE)
        );
        assert_eq!(
            resolve_recovery_job(&snapshot(CaseStatus::ApptConfirmed)),
            Some(job_type::POST_ROOM1_FINAL_APPT)
        );
        assert_eq!(
            resolve_recovery_job(&snapshot(CaseStatus::ApptDenied)),
            Some(job_type::POST_ROOM1_FINAL_APPT_DENIED)
        );
        assert_eq!(
            resolve_recovery_job(&snapshot(CaseStatus::Failed)),
            Some(job_type::POST_ROOM1_FINAL_FAILURE)
        );
        assert_eq!(
            resolve_recovery_job(&snapshot(CaseStatus::CleanupRunning)),
            Some(job_type::EXECUTE_CLEANUP)
        );
    }

    #[test]
    fn waiting_states_have_no_continuation() {
        assert_eq!(resolve_recovery_job(&snapshot(CaseStatus::New)), None);
        assert_eq!(resolve_recovery_job(&snapshot(CaseStatus::WaitDoctor)), None);
        assert_eq!(resolve_recovery_job(&snapshot(CaseStatus::WaitScheduler)), None);
    }

    #[test]
    fn cleanup_thumbs_resumes_only_when_triggered_and_incomplete() {
        let mut waiting = snapshot(CaseStatus::WaitR1CleanupThumbs);
        assert_eq!(resolve_recovery_job(&waiting), None);

        waiting.cleanup_triggered_at = Some(Utc::now());
        assert_eq!(resolve_recovery_job(&waiting), Some(job_type::EXECUTE_CLEANUP));

        waiting.cleanup_completed_at = Some(Utc::now());
        assert_eq!(resolve_recovery_job(&waiting), None);
    }
}
