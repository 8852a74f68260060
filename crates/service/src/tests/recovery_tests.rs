use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use triage_core::CaseStatus;
use triage_storage::{JobQueueStore, JobStatus, NewJob, job_type};

use crate::recovery::RecoveryService;
use crate::tests::fakes::InMemoryStore;

fn make_service(store: &Arc<InMemoryStore>) -> RecoveryService {
    RecoveryService::new(
        Arc::clone(store) as _,
        Arc::clone(store) as _,
        Arc::clone(store) as _,
    )
}

#[tokio::test]
async fn orphaned_running_jobs_are_reset_to_queued() {
    let store = Arc::new(InMemoryStore::new());
    let job = store.enqueue(NewJob::now("anything", None, json!({}))).await.unwrap();
    store.claim_due(10).await.unwrap();
    assert_eq!(store.job(job.job_id).status, JobStatus::Running);

    let result = make_service(&store).recover().await.unwrap();

    assert_eq!(result.reset_running_jobs, 1);
    assert_eq!(store.job(job.job_id).status, JobStatus::Queued);
}

#[tokio::test]
async fn stranded_cases_get_their_continuation_jobs() {
    let store = Arc::new(InMemoryStore::new());
    let widget_case = Uuid::new_v4();
    let denial_case = Uuid::new_v4();
    store.seed_case(widget_case, CaseStatus::LlmSuggest);
    store.seed_case(denial_case, CaseStatus::DoctorDenied);

    let result = make_service(&store).recover().await.unwrap();

    assert_eq!(result.scanned_cases, 2);
    assert_eq!(result.enqueued_jobs, 2);
    assert_eq!(store.queued_jobs_of_type(job_type::POST_ROOM2_WIDGET).len(), 1);
    assert_eq!(store.queued_jobs_of_type(job_type::POST_ROOM1_FINAL_DENIAL_TRIAGE).len(), 1);
    assert_eq!(store.events_of_type("RECOVERY_JOB_ENQUEUED").len(), 2);
}

#[tokio::test]
async fn recovery_never_duplicates_active_jobs() {
    let store = Arc::new(InMemoryStore::new());
    let case_id = Uuid::new_v4();
    store.seed_case(case_id, CaseStatus::ApptConfirmed);
    let service = make_service(&store);

    service.recover().await.unwrap();
    let second = service.recover().await.unwrap();

    assert_eq!(second.enqueued_jobs, 0);
    assert_eq!(store.queued_jobs_of_type(job_type::POST_ROOM1_FINAL_APPT).len(), 1);
}

#[tokio::test]
async fn failed_case_gets_failure_reply_with_recovery_payload() {
    let store = Arc::new(InMemoryStore::new());
    let case_id = Uuid::new_v4();
    store.seed_case(case_id, CaseStatus::Failed);

    make_service(&store).recover().await.unwrap();

    let jobs = store.queued_jobs_of_type(job_type::POST_ROOM1_FINAL_FAILURE);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload["cause"], "other");
    assert_eq!(
        jobs[0].payload["details"],
        "recovery enqueued missing failure finalization job"
    );
}

#[tokio::test]
async fn waiting_cases_are_left_alone() {
    let store = Arc::new(InMemoryStore::new());
    store.seed_case(Uuid::new_v4(), CaseStatus::WaitDoctor);
    store.seed_case(Uuid::new_v4(), CaseStatus::WaitScheduler);
    store.seed_case(Uuid::new_v4(), CaseStatus::WaitR1CleanupThumbs);

    let result = make_service(&store).recover().await.unwrap();

    assert_eq!(result.scanned_cases, 3);
    assert_eq!(result.enqueued_jobs, 0);
    assert!(store.jobs().is_empty());
}

#[tokio::test]
async fn interrupted_cleanup_resumes() {
    let store = Arc::new(InMemoryStore::new());
    let running = Uuid::new_v4();
    let triggered = Uuid::new_v4();
    store.seed_case(running, CaseStatus::CleanupRunning);
    store.seed_case(triggered, CaseStatus::WaitR1CleanupThumbs);
    store.with_case(triggered, |case| case.cleanup_triggered_at = Some(chrono::Utc::now()));

    let result = make_service(&store).recover().await.unwrap();

    assert_eq!(result.enqueued_jobs, 2);
    assert_eq!(store.queued_jobs_of_type(job_type::EXECUTE_CLEANUP).len(), 2);
}
