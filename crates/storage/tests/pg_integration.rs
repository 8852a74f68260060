//! Integration tests for PgStorage.
//! Run with: DATABASE_URL=... cargo test -p triage-storage -- --ignored pg_

#![allow(clippy::unwrap_used, reason = "integration test code")]

use chrono::{Duration, Utc};
use serde_json::json;
use triage_core::{CaseStatus, DoctorDecision, SupportFlag};
use triage_storage::{
    CaseStore, DispatchStore, JobQueueStore, MessageStore, NewCase, NewCaseMessage, NewJob,
    NewReportTranscript, PgStorage, TranscriptStore,
};
use uuid::Uuid;

async fn create_pg_storage() -> PgStorage {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for PgStorage integration tests");
    PgStorage::new(&url).await.expect("Failed to connect to PostgreSQL")
}

fn make_case(case_id: Uuid) -> NewCase {
    NewCase {
        case_id,
        status: CaseStatus::New,
        room1_origin_room_id: format!("!room1-{case_id}:example.org"),
        room1_origin_event_id: format!("$origin-{case_id}"),
        room1_sender_user_id: "@requester:example.org".to_owned(),
    }
}

// ── Cases ────────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn pg_duplicate_origin_event_is_rejected() {
    let storage = create_pg_storage().await;
    let case_id = Uuid::new_v4();
    let case = make_case(case_id);

    storage.create_case(case.clone()).await.unwrap();

    let mut duplicate = case;
    duplicate.case_id = Uuid::new_v4();
    let err = storage.create_case(duplicate).await.unwrap_err();
    assert!(err.is_duplicate(), "expected duplicate error, got {err}");
}

#[tokio::test]
#[ignore]
async fn pg_transition_status_is_compare_and_set() {
    let storage = create_pg_storage().await;
    let case_id = Uuid::new_v4();
    storage.create_case(make_case(case_id)).await.unwrap();

    let moved = storage
        .transition_status(case_id, CaseStatus::New, CaseStatus::PdfExtracted)
        .await
        .unwrap();
    assert!(moved);

    let stale = storage
        .transition_status(case_id, CaseStatus::New, CaseStatus::PdfExtracted)
        .await
        .unwrap();
    assert!(!stale, "second CAS from NEW must not match");
}

#[tokio::test]
#[ignore]
async fn pg_doctor_decision_applies_only_in_wait_doctor() {
    let storage = create_pg_storage().await;
    let case_id = Uuid::new_v4();
    storage.create_case(make_case(case_id)).await.unwrap();

    let early = storage
        .apply_doctor_decision(
            case_id,
            DoctorDecision::Accept,
            SupportFlag::None,
            None,
            Utc::now(),
            CaseStatus::DoctorAccepted,
        )
        .await
        .unwrap();
    assert!(!early, "decision must not apply to a NEW case");

    storage.update_status(case_id, CaseStatus::WaitDoctor).await.unwrap();
    let applied = storage
        .apply_doctor_decision(
            case_id,
            DoctorDecision::Accept,
            SupportFlag::Anesthesist,
            Some("apto"),
            Utc::now(),
            CaseStatus::DoctorAccepted,
        )
        .await
        .unwrap();
    assert!(applied);

    let case = storage.get_case(case_id).await.unwrap().unwrap();
    assert_eq!(case.status, CaseStatus::DoctorAccepted);
    assert_eq!(case.doctor_decision, Some(DoctorDecision::Accept));
    assert_eq!(case.doctor_support_flag, Some(SupportFlag::Anesthesist));
}

// ── Job queue ────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn pg_enqueue_creates_queued_job() {
    let storage = create_pg_storage().await;

    let record = storage
        .enqueue(NewJob {
            job_type: "process_pdf_case".to_owned(),
            case_id: None,
            payload: json!({"key": "value"}),
            run_after: None,
            max_attempts: 7,
        })
        .await
        .unwrap();

    assert_eq!(record.status, triage_storage::JobStatus::Queued);
    assert_eq!(record.job_type, "process_pdf_case");
    assert_eq!(record.max_attempts, 7);
    assert_eq!(record.attempts, 0);
}

#[tokio::test]
#[ignore]
async fn pg_concurrent_claims_get_distinct_jobs() {
    let storage = create_pg_storage().await;
    let marker = Uuid::new_v4().to_string();
    for _ in 0..2 {
        storage
            .enqueue(NewJob::now(format!("claim-race-{marker}"), None, json!({})))
            .await
            .unwrap();
    }

    let left = storage.clone();
    let right = storage.clone();
    let (claimed_left, claimed_right) =
        tokio::join!(async move { left.claim_due(1).await.unwrap() }, async move {
            right.claim_due(1).await.unwrap()
        });

    assert_eq!(claimed_left.len(), 1);
    assert_eq!(claimed_right.len(), 1);
    assert_ne!(claimed_left[0].job_id, claimed_right[0].job_id);
}

#[tokio::test]
#[ignore]
async fn pg_future_jobs_are_not_claimed() {
    let storage = create_pg_storage().await;
    let job = storage
        .enqueue(NewJob {
            job_type: format!("future-{}", Uuid::new_v4()),
            case_id: None,
            payload: json!({}),
            run_after: Some(Utc::now() + Duration::hours(1)),
            max_attempts: 5,
        })
        .await
        .unwrap();

    let claimed = storage.claim_due(50).await.unwrap();
    assert!(claimed.iter().all(|c| c.job_id != job.job_id));
}

#[tokio::test]
#[ignore]
async fn pg_schedule_retry_requeues_and_counts_attempt() {
    let storage = create_pg_storage().await;
    let job = storage
        .enqueue(NewJob::now(format!("retry-{}", Uuid::new_v4()), None, json!({})))
        .await
        .unwrap();

    let retried = storage
        .schedule_retry(job.job_id, Utc::now() + Duration::seconds(30), "temporary failure")
        .await
        .unwrap();

    assert_eq!(retried.status, triage_storage::JobStatus::Queued);
    assert_eq!(retried.attempts, 1);
    assert_eq!(retried.last_error.as_deref(), Some("temporary failure"));
}

#[tokio::test]
#[ignore]
async fn pg_dead_jobs_stay_dead() {
    let storage = create_pg_storage().await;
    let job = storage
        .enqueue(NewJob::now(format!("dead-{}", Uuid::new_v4()), None, json!({})))
        .await
        .unwrap();

    let dead = storage.mark_dead(job.job_id, "max attempts reached").await.unwrap();
    assert_eq!(dead.status, triage_storage::JobStatus::Dead);

    let err = storage
        .schedule_retry(job.job_id, Utc::now(), "must not requeue")
        .await
        .unwrap_err();
    assert!(matches!(err, triage_storage::StorageError::NotFound { .. }));
}

#[tokio::test]
#[ignore]
async fn pg_has_active_job_sees_queued_and_running() {
    let storage = create_pg_storage().await;
    let case_id = Uuid::new_v4();
    storage.create_case(make_case(case_id)).await.unwrap();
    let job_type = format!("active-{case_id}");

    assert!(!storage.has_active_job(case_id, &job_type).await.unwrap());

    storage.enqueue(NewJob::now(job_type.clone(), Some(case_id), json!({}))).await.unwrap();
    assert!(storage.has_active_job(case_id, &job_type).await.unwrap());
}

// ── Messages / transcripts ───────────────────────────────────────

#[tokio::test]
#[ignore]
async fn pg_duplicate_message_mapping_is_rejected() {
    let storage = create_pg_storage().await;
    let case_id = Uuid::new_v4();
    storage.create_case(make_case(case_id)).await.unwrap();

    let message = NewCaseMessage {
        case_id,
        room_id: "!room2:example.org".to_owned(),
        event_id: format!("$widget-{case_id}"),
        kind: "bot_widget".to_owned(),
        sender_user_id: None,
    };
    storage.add_message(message.clone()).await.unwrap();

    let err = storage.add_message(message).await.unwrap_err();
    assert!(err.is_duplicate());
}

#[tokio::test]
#[ignore]
async fn pg_transcripts_reject_update_and_delete() {
    let storage = create_pg_storage().await;
    let case_id = Uuid::new_v4();
    storage.create_case(make_case(case_id)).await.unwrap();

    let id = storage
        .append_report_transcript(NewReportTranscript {
            case_id,
            pdf_source_ref: "mxc://example.org/report".to_owned(),
            raw_text: "raw".to_owned(),
            cleaned_text: "cleaned".to_owned(),
            agency_record_number: Some("47773".to_owned()),
        })
        .await
        .unwrap();

    let update = sqlx::query("UPDATE case_report_transcripts SET raw_text = 'x' WHERE id = $1")
        .bind(id)
        .execute(storage.pool())
        .await;
    assert!(update.is_err(), "UPDATE must be rejected by the append-only trigger");

    let delete = sqlx::query("DELETE FROM case_report_transcripts WHERE id = $1")
        .bind(id)
        .execute(storage.pool())
        .await;
    assert!(delete.is_err(), "DELETE must be rejected by the append-only trigger");
}

// ── Room-4 dispatches ────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn pg_dispatch_window_claim_is_idempotent() {
    let storage = create_pg_storage().await;
    let room_id = format!("!room4-{}:example.org", Uuid::new_v4());
    let window_end = Utc::now();
    let window_start = window_end - Duration::hours(12);

    assert!(storage.claim_window(&room_id, window_start, window_end).await.unwrap());
    assert!(!storage.claim_window(&room_id, window_start, window_end).await.unwrap());

    assert!(
        storage
            .mark_sent(&room_id, window_start, window_end, "$event", Utc::now())
            .await
            .unwrap()
    );
    // Sent windows are never reclaimed.
    assert!(!storage.claim_window(&room_id, window_start, window_end).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn pg_failed_dispatch_window_can_be_reclaimed_once() {
    let storage = create_pg_storage().await;
    let room_id = format!("!room4-{}:example.org", Uuid::new_v4());
    let window_end = Utc::now();
    let window_start = window_end - Duration::hours(12);

    assert!(storage.claim_window(&room_id, window_start, window_end).await.unwrap());
    assert!(
        DispatchStore::mark_failed(&storage, &room_id, window_start, window_end, "post failed")
            .await
            .unwrap()
    );

    assert!(storage.claim_window(&room_id, window_start, window_end).await.unwrap());
    assert!(!storage.claim_window(&room_id, window_start, window_end).await.unwrap());
}
