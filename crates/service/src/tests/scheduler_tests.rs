use std::sync::Arc;

use chrono::{TimeZone, Utc};

use triage_storage::{DispatchStatus, job_type};

use crate::scheduler::SupervisorSummaryScheduler;
use crate::tests::fakes::InMemoryStore;

fn make_scheduler(store: &Arc<InMemoryStore>) -> SupervisorSummaryScheduler {
    SupervisorSummaryScheduler::new(
        Arc::clone(store) as _,
        Arc::clone(store) as _,
        "!room4:example.org".to_owned(),
        "America/Bahia".to_owned(),
        7,
        19,
    )
}

#[tokio::test]
async fn scheduler_enqueues_summary_with_canonical_utc_payload() {
    let store = Arc::new(InMemoryStore::new());
    let scheduler = make_scheduler(&store);
    let run_at = Utc.with_ymd_and_hms(2026, 2, 16, 22, 0, 0).unwrap();

    let result = scheduler.enqueue_previous_window_summary(Some(run_at)).await.unwrap();

    assert!(result.claimed_dispatch);
    assert_eq!(result.enqueued_job_id, Some(1));
    assert_eq!(
        result.window.window_start_utc,
        Utc.with_ymd_and_hms(2026, 2, 16, 10, 0, 0).unwrap()
    );
    assert_eq!(result.window.window_end_utc, run_at);

    let jobs = store.queued_jobs_of_type(job_type::POST_ROOM4_SUMMARY);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].case_id, None);
    assert_eq!(jobs[0].payload["room_id"], "!room4:example.org");
    assert_eq!(jobs[0].payload["window_start"], "2026-02-16T10:00:00+00:00");
    assert_eq!(jobs[0].payload["window_end"], "2026-02-16T22:00:00+00:00");
    assert_eq!(jobs[0].payload["timezone"], "America/Bahia");
}

#[tokio::test]
async fn scheduler_rerun_for_same_window_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let scheduler = make_scheduler(&store);
    let run_at = Utc.with_ymd_and_hms(2026, 2, 16, 22, 0, 0).unwrap();

    let first = scheduler.enqueue_previous_window_summary(Some(run_at)).await.unwrap();
    let second = scheduler.enqueue_previous_window_summary(Some(run_at)).await.unwrap();

    assert!(first.claimed_dispatch);
    assert_eq!(first.enqueued_job_id, Some(1));
    assert!(!second.claimed_dispatch);
    assert_eq!(second.enqueued_job_id, None);

    assert_eq!(store.queued_jobs_of_type(job_type::POST_ROOM4_SUMMARY).len(), 1);
    let dispatches = store.dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].status, DispatchStatus::Pending);
}

#[tokio::test]
async fn different_windows_get_independent_dispatches() {
    let store = Arc::new(InMemoryStore::new());
    let scheduler = make_scheduler(&store);

    let morning = Utc.with_ymd_and_hms(2026, 2, 16, 10, 0, 0).unwrap();
    let evening = Utc.with_ymd_and_hms(2026, 2, 16, 22, 0, 0).unwrap();

    let first = scheduler.enqueue_previous_window_summary(Some(morning)).await.unwrap();
    let second = scheduler.enqueue_previous_window_summary(Some(evening)).await.unwrap();

    assert!(first.claimed_dispatch);
    assert!(second.claimed_dispatch);
    assert_eq!(store.queued_jobs_of_type(job_type::POST_ROOM4_SUMMARY).len(), 2);
    assert_eq!(store.dispatches().len(), 2);
}
