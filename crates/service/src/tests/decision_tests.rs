use std::sync::Arc;

use uuid::Uuid;

use triage_core::{CaseStatus, DoctorDecision, SupportFlag};
use triage_storage::job_type;

use crate::decision::{DecisionOutcome, DecisionRequest, HandleDoctorDecisionService};
use crate::tests::fakes::InMemoryStore;

fn make_service(store: &Arc<InMemoryStore>) -> HandleDoctorDecisionService {
    HandleDoctorDecisionService::new(
        Arc::clone(store) as _,
        Arc::clone(store) as _,
        Arc::clone(store) as _,
    )
}

fn accept_request(case_id: Uuid) -> DecisionRequest {
    DecisionRequest {
        case_id,
        doctor_user_id: "@doctor:example.org".to_owned(),
        decision: DoctorDecision::Accept,
        support_flag: SupportFlag::Anesthesist,
        reason: Some("apto".to_owned()),
        submitted_at: None,
        widget_event_id: Some("$widget".to_owned()),
    }
}

#[tokio::test]
async fn accept_decision_transitions_case_and_enqueues_room3_request() {
    let store = Arc::new(InMemoryStore::new());
    let case_id = Uuid::new_v4();
    store.seed_case(case_id, CaseStatus::WaitDoctor);
    let service = make_service(&store);

    let outcome = service.handle(&accept_request(case_id)).await.unwrap();

    assert_eq!(outcome, DecisionOutcome::Applied);
    let case = store.case(case_id);
    assert_eq!(case.status, CaseStatus::DoctorAccepted);
    assert_eq!(case.doctor_decision, Some(DoctorDecision::Accept));
    assert_eq!(case.doctor_support_flag, Some(SupportFlag::Anesthesist));
    assert!(case.doctor_decided_at.is_some());

    let queued = store.queued_jobs_of_type(job_type::POST_ROOM3_REQUEST);
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].case_id, Some(case_id));
    assert_eq!(store.events_of_type("DOCTOR_DECISION_RECORDED").len(), 1);
}

#[tokio::test]
async fn deny_decision_enqueues_denial_triage_final() {
    let store = Arc::new(InMemoryStore::new());
    let case_id = Uuid::new_v4();
    store.seed_case(case_id, CaseStatus::WaitDoctor);
    let service = make_service(&store);

    let request = DecisionRequest {
        decision: DoctorDecision::Deny,
        support_flag: SupportFlag::None,
        reason: Some("sem exames".to_owned()),
        ..accept_request(case_id)
    };
    let outcome = service.handle(&request).await.unwrap();

    assert_eq!(outcome, DecisionOutcome::Applied);
    assert_eq!(store.case(case_id).status, CaseStatus::DoctorDenied);
    assert_eq!(store.queued_jobs_of_type(job_type::POST_ROOM1_FINAL_DENIAL_TRIAGE).len(), 1);
    assert!(store.queued_jobs_of_type(job_type::POST_ROOM3_REQUEST).is_empty());
}

#[tokio::test]
async fn unknown_case_yields_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let service = make_service(&store);

    let outcome = service.handle(&accept_request(Uuid::new_v4())).await.unwrap();

    assert_eq!(outcome, DecisionOutcome::NotFound);
}

#[tokio::test]
async fn repeated_decision_is_wrong_state_with_idempotent_marker() {
    let store = Arc::new(InMemoryStore::new());
    let case_id = Uuid::new_v4();
    store.seed_case(case_id, CaseStatus::WaitDoctor);
    let service = make_service(&store);
    let request = accept_request(case_id);

    let first = service.handle(&request).await.unwrap();
    let second = service.handle(&request).await.unwrap();

    assert_eq!(first, DecisionOutcome::Applied);
    assert_eq!(second, DecisionOutcome::WrongState { already_recorded: true });
    // The repeat must not enqueue more work.
    assert_eq!(store.queued_jobs_of_type(job_type::POST_ROOM3_REQUEST).len(), 1);
}

#[tokio::test]
async fn conflicting_decision_is_wrong_state_without_marker() {
    let store = Arc::new(InMemoryStore::new());
    let case_id = Uuid::new_v4();
    store.seed_case(case_id, CaseStatus::WaitDoctor);
    let service = make_service(&store);

    service.handle(&accept_request(case_id)).await.unwrap();
    let conflicting = DecisionRequest {
        decision: DoctorDecision::Deny,
        support_flag: SupportFlag::None,
        ..accept_request(case_id)
    };
    let outcome = service.handle(&conflicting).await.unwrap();

    assert_eq!(outcome, DecisionOutcome::WrongState { already_recorded: false });
}

#[test]
fn deny_with_support_fails_validation() {
    let request = DecisionRequest {
        case_id: Uuid::new_v4(),
        doctor_user_id: "@doctor:example.org".to_owned(),
        decision: DoctorDecision::Deny,
        support_flag: SupportFlag::Anesthesist,
        reason: None,
        submitted_at: None,
        widget_event_id: None,
    };

    assert!(request.validate().is_err());
}

#[test]
fn decision_payload_rejects_unknown_fields() {
    let raw = serde_json::json!({
        "case_id": Uuid::new_v4(),
        "doctor_user_id": "@doctor:example.org",
        "decision": "accept",
        "surprise": true,
    });

    assert!(serde_json::from_value::<DecisionRequest>(raw).is_err());
}
