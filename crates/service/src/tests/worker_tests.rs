use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use triage_core::CaseStatus;
use triage_storage::{JobQueueStore, JobRecord, JobStatus, NewJob, job_type};

use crate::error::ServiceError;
use crate::job_failure::JobFailureService;
use crate::tests::fakes::InMemoryStore;
use crate::worker::{HandlerMap, JobHandler, WorkerRuntime};

struct AlwaysOk;

#[async_trait]
impl JobHandler for AlwaysOk {
    async fn handle(&self, _job: &JobRecord) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct AlwaysFails(&'static str);

#[async_trait]
impl JobHandler for AlwaysFails {
    async fn handle(&self, _job: &JobRecord) -> Result<(), ServiceError> {
        Err(ServiceError::InvalidPayload(self.0.to_owned()))
    }
}

fn runtime_with(store: &Arc<InMemoryStore>, handlers: HandlerMap) -> WorkerRuntime {
    WorkerRuntime::new(Arc::clone(store) as _, handlers)
}

#[tokio::test]
async fn successful_job_is_marked_done() {
    let store = Arc::new(InMemoryStore::new());
    let job = store.enqueue(NewJob::now("ok-job", None, json!({}))).await.unwrap();
    let mut handlers: HandlerMap = HandlerMap::new();
    handlers.insert("ok-job".to_owned(), Arc::new(AlwaysOk));
    let runtime = runtime_with(&store, handlers);

    let claimed = runtime.run_once().await.unwrap();

    assert_eq!(claimed, 1);
    assert_eq!(store.job(job.job_id).status, JobStatus::Done);
}

#[tokio::test]
async fn unknown_job_type_is_retried_with_standard_message() {
    let store = Arc::new(InMemoryStore::new());
    let job = store.enqueue(NewJob::now("unknown-type", None, json!({}))).await.unwrap();
    let runtime = runtime_with(&store, HandlerMap::new());

    let claimed = runtime.run_once().await.unwrap();

    assert_eq!(claimed, 1);
    let job = store.job(job.job_id);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.last_error.as_deref(), Some("Unknown job type: unknown-type"));
}

#[tokio::test]
async fn failed_job_is_rescheduled_with_first_backoff_window() {
    let store = Arc::new(InMemoryStore::new());
    let job = store.enqueue(NewJob::now("flaky", None, json!({}))).await.unwrap();
    let mut handlers: HandlerMap = HandlerMap::new();
    handlers.insert("flaky".to_owned(), Arc::new(AlwaysFails("transient trouble")));
    let runtime = runtime_with(&store, handlers);

    let before = Utc::now();
    runtime.run_once().await.unwrap();

    let job = store.job(job.job_id);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    let delay_secs = (job.run_after - before).num_seconds();
    assert!((26..=34).contains(&delay_secs), "got {delay_secs}s");
}

#[tokio::test]
async fn exhausted_job_is_dead_lettered_and_finalized() {
    let store = Arc::new(InMemoryStore::new());
    let case_id = Uuid::new_v4();
    store.seed_case(case_id, CaseStatus::LlmSuggest);

    let job = store
        .enqueue(NewJob {
            job_type: "doomed".to_owned(),
            case_id: Some(case_id),
            payload: json!({}),
            run_after: None,
            max_attempts: 1,
        })
        .await
        .unwrap();

    let mut handlers: HandlerMap = HandlerMap::new();
    handlers.insert("doomed".to_owned(), Arc::new(AlwaysFails("llm1: schema broke")));
    let finalizer = Arc::new(JobFailureService::new(
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
    ));
    let runtime = runtime_with(&store, handlers).with_failure_finalizer(finalizer);

    runtime.run_once().await.unwrap();

    let job = store.job(job.job_id);
    assert_eq!(job.status, JobStatus::Dead);
    assert_eq!(store.case(case_id).status, CaseStatus::Failed);

    let failure_jobs = store.queued_jobs_of_type(job_type::POST_ROOM1_FINAL_FAILURE);
    assert_eq!(failure_jobs.len(), 1);
    assert_eq!(failure_jobs[0].payload["cause"], "llm1");
    assert_eq!(failure_jobs[0].payload["details"], "llm1: schema broke");
    assert_eq!(store.events_of_type("CASE_FAILED_MAX_RETRIES").len(), 1);
}

#[tokio::test]
async fn dead_failure_reply_job_does_not_loop() {
    let store = Arc::new(InMemoryStore::new());
    let case_id = Uuid::new_v4();
    store.seed_case(case_id, CaseStatus::Failed);

    let job = store
        .enqueue(NewJob {
            job_type: job_type::POST_ROOM1_FINAL_FAILURE.to_owned(),
            case_id: Some(case_id),
            payload: json!({"cause": "other", "details": "x"}),
            run_after: None,
            max_attempts: 1,
        })
        .await
        .unwrap();

    let mut handlers: HandlerMap = HandlerMap::new();
    handlers.insert(
        job_type::POST_ROOM1_FINAL_FAILURE.to_owned(),
        Arc::new(AlwaysFails("matrix down")),
    );
    let finalizer = Arc::new(JobFailureService::new(
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
    ));
    let runtime = runtime_with(&store, handlers).with_failure_finalizer(finalizer);

    runtime.run_once().await.unwrap();

    assert_eq!(store.job(job.job_id).status, JobStatus::Dead);
    // No replacement failure job may be enqueued for the dead reply job.
    assert!(store.queued_jobs_of_type(job_type::POST_ROOM1_FINAL_FAILURE).is_empty());
}

#[tokio::test]
async fn stop_signal_ends_polling_loop() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = Arc::new(
        runtime_with(&store, HandlerMap::new())
            .with_poll_interval(std::time::Duration::from_millis(10)),
    );
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    let loop_handle = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move { runtime.run_until_stopped(stop_rx).await }
    });

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    stop_tx.send(true).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(1), loop_handle)
        .await
        .expect("loop must stop")
        .unwrap()
        .unwrap();
}
