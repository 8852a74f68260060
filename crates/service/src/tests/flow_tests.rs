//! End-to-end flow through the handlers with deterministic LLM clients.

use std::sync::Arc;

use uuid::Uuid;

use triage_core::{CaseStatus, DoctorDecision, SupportFlag};
use triage_llm::{DeterministicClient, DeterministicStage};
use triage_matrix::{PdfOriginEvent, ReplyEvent};
use triage_storage::{job_type, message_kind};

use crate::cleanup::ExecuteCleanupService;
use crate::decision::HandleDoctorDecisionService;
use crate::intake::{IntakeOutcome, Room1IntakeService};
use crate::llm1::Llm1Service;
use crate::llm2::Llm2Service;
use crate::pipeline::ProcessPdfCaseService;
use crate::ports::PlainTextExtractor;
use crate::prompts::PromptTemplateService;
use crate::room1::{FinalReplyKind, Room1FinalService};
use crate::room2::{PostRoom2WidgetService, Room2ReplyOutcome, Room2ReplyService};
use crate::room3::{PostRoom3RequestService, Room3ReplyOutcome, Room3SchedulerReplyService};
use crate::tests::fakes::{FakeMatrixClient, InMemoryStore, RecordingSleeper};

const ROOM2: &str = "!room2:example.org";
const ROOM3: &str = "!room3:example.org";

struct Harness {
    store: Arc<InMemoryStore>,
    matrix: Arc<FakeMatrixClient>,
    intake: Room1IntakeService,
    pipeline: ProcessPdfCaseService,
    room2_post: PostRoom2WidgetService,
    room2_reply: Room2ReplyService,
    room3_post: PostRoom3RequestService,
    room3_reply: Room3SchedulerReplyService,
    room1_final: Room1FinalService,
    cleanup: ExecuteCleanupService,
}

fn make_harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    store.seed_default_prompts();
    let matrix = Arc::new(FakeMatrixClient::new());
    let prompts = Arc::new(PromptTemplateService::new(Arc::clone(&store) as _));

    let llm1 = Arc::new(Llm1Service::new(
        Arc::new(DeterministicClient::new(DeterministicStage::Llm1)),
        Arc::clone(&prompts),
        Arc::clone(&store) as _,
    ));
    let llm2 = Arc::new(Llm2Service::new(
        Arc::new(DeterministicClient::new(DeterministicStage::Llm2)),
        Arc::clone(&prompts),
        Arc::clone(&store) as _,
    ));

    let decision = Arc::new(HandleDoctorDecisionService::new(
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
    ));

    Harness {
        intake: Room1IntakeService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
        ),
        pipeline: ProcessPdfCaseService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&matrix) as _,
            Arc::new(PlainTextExtractor),
            llm1,
            llm2,
        ),
        room2_post: PostRoom2WidgetService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&matrix) as _,
            ROOM2.to_owned(),
        ),
        room2_reply: Room2ReplyService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&matrix) as _,
            decision,
            ROOM2.to_owned(),
        ),
        room3_post: PostRoom3RequestService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&matrix) as _,
            ROOM3.to_owned(),
        ),
        room3_reply: Room3SchedulerReplyService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&matrix) as _,
            ROOM3.to_owned(),
        ),
        room1_final: Room1FinalService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&matrix) as _,
        ),
        cleanup: ExecuteCleanupService::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&matrix) as _,
            Arc::new(RecordingSleeper::new()),
        ),
        store,
        matrix,
    }
}

fn pdf_event() -> PdfOriginEvent {
    PdfOriginEvent {
        room_id: "!room1:example.org".to_owned(),
        event_id: "$origin".to_owned(),
        sender: "@requester:example.org".to_owned(),
        pdf_mxc_url: "mxc://example.org/report1".to_owned(),
        filename: "laudo.pdf".to_owned(),
    }
}

async fn intake_case(harness: &Harness) -> Uuid {
    match harness.intake.handle_pdf_event(&pdf_event()).await.unwrap() {
        IntakeOutcome::Created(case_id) => case_id,
        IntakeOutcome::Duplicate => panic!("expected fresh case"),
    }
}

#[tokio::test]
async fn intake_creates_case_and_pipeline_job_once() {
    let harness = make_harness();

    let case_id = intake_case(&harness).await;
    let duplicate = harness.intake.handle_pdf_event(&pdf_event()).await.unwrap();

    assert_eq!(duplicate, IntakeOutcome::Duplicate);
    assert_eq!(harness.store.case(case_id).status, CaseStatus::New);
    assert_eq!(harness.store.queued_jobs_of_type(job_type::PROCESS_PDF_CASE).len(), 1);
    assert_eq!(harness.store.message_kinds(case_id), vec![message_kind::ROOM1_ORIGIN]);
}

#[tokio::test]
async fn pipeline_extracts_and_prepares_widget_posting() {
    let harness = make_harness();
    let case_id = intake_case(&harness).await;

    harness.pipeline.run(case_id, "mxc://example.org/report1").await.unwrap();

    let case = harness.store.case(case_id);
    assert_eq!(case.status, CaseStatus::R2PostWidget);
    assert_eq!(case.agency_record_number.as_deref(), Some("47773"));
    assert!(case.extracted_text.is_some());
    assert!(!case.extracted_text.as_deref().unwrap().contains("47773"));
    assert!(case.structured_data.is_some());
    assert!(case.summary_text.is_some());
    assert_eq!(case.suggested_action.as_ref().unwrap()["suggestion"], "accept");

    assert_eq!(harness.store.queued_jobs_of_type(job_type::POST_ROOM2_WIDGET).len(), 1);
    // Both stages leave an interaction transcript.
    assert_eq!(harness.store.llm_interactions().len(), 2);
}

#[tokio::test]
async fn widget_posting_arms_room2_and_waits_for_doctor() {
    let harness = make_harness();
    let case_id = intake_case(&harness).await;
    harness.pipeline.run(case_id, "mxc://example.org/report1").await.unwrap();

    harness.room2_post.run(case_id).await.unwrap();

    assert_eq!(harness.store.case(case_id).status, CaseStatus::WaitDoctor);
    let kinds = harness.store.message_kinds(case_id);
    for expected in [
        message_kind::ROOM2_PDF,
        message_kind::ROOM2_SUMMARY,
        message_kind::ROOM2_INSTRUCTIONS,
        message_kind::BOT_WIDGET,
    ] {
        assert!(kinds.iter().any(|kind| kind == expected), "missing {expected}");
    }
    assert_eq!(harness.store.events_of_type("ROOM2_WIDGET_POSTED").len(), 1);

    // A retried job must not double-post.
    let sent_before = harness.matrix.sent_messages().len();
    harness.store.with_case(case_id, |case| case.status = CaseStatus::R2PostWidget);
    harness.room2_post.run(case_id).await.unwrap();
    assert_eq!(harness.matrix.sent_messages().len(), sent_before);
}

#[tokio::test]
async fn full_confirmed_appointment_flow_reaches_cleaned() {
    let harness = make_harness();
    let case_id = intake_case(&harness).await;
    harness.pipeline.run(case_id, "mxc://example.org/report1").await.unwrap();
    harness.room2_post.run(case_id).await.unwrap();

    // Doctor accepts by replying to the copy-paste template.
    let widget_event = harness
        .store
        .message_event_id(case_id, message_kind::BOT_WIDGET)
        .expect("widget posted");
    let outcome = harness
        .room2_reply
        .handle_reply(&ReplyEvent {
            room_id: ROOM2.to_owned(),
            event_id: "$doctor-reply".to_owned(),
            sender: "@doctor:example.org".to_owned(),
            reply_to_event_id: widget_event,
            body: format!(
                "decisao: aceitar\nsuporte: anestesista\nmotivo: apto\ncaso: {case_id}"
            ),
        })
        .await
        .unwrap();
    assert_eq!(outcome, Room2ReplyOutcome::Applied);

    let case = harness.store.case(case_id);
    assert_eq!(case.status, CaseStatus::DoctorAccepted);
    assert_eq!(case.doctor_decision, Some(DoctorDecision::Accept));
    assert_eq!(case.doctor_support_flag, Some(SupportFlag::Anesthesist));

    harness.room3_post.run(case_id).await.unwrap();
    assert_eq!(harness.store.case(case_id).status, CaseStatus::WaitScheduler);

    // Scheduler confirms by replying to the Room-3 template.
    let template_event = harness
        .store
        .message_event_id(case_id, message_kind::ROOM3_TEMPLATE)
        .expect("template posted");
    let outcome = harness
        .room3_reply
        .handle_reply(&ReplyEvent {
            room_id: ROOM3.to_owned(),
            event_id: "$scheduler-reply".to_owned(),
            sender: "@scheduler:example.org".to_owned(),
            reply_to_event_id: template_event,
            body: format!(
                "16-02-2026 14:30 BRT\nlocal: Sala 2\ninstrucoes: Jejum 8h\ncaso: {case_id}"
            ),
        })
        .await
        .unwrap();
    assert!(matches!(outcome, Room3ReplyOutcome::Applied(_)));
    assert_eq!(harness.store.case(case_id).status, CaseStatus::ApptConfirmed);
    assert_eq!(harness.store.queued_jobs_of_type(job_type::POST_ROOM1_FINAL_APPT).len(), 1);

    harness
        .room1_final
        .run(case_id, FinalReplyKind::ApptConfirmed, &serde_json::json!({}))
        .await
        .unwrap();
    let case = harness.store.case(case_id);
    assert_eq!(case.status, CaseStatus::WaitR1CleanupThumbs);
    assert!(case.cleanup_triggered_at.is_some());
    assert_eq!(harness.store.queued_jobs_of_type(job_type::EXECUTE_CLEANUP).len(), 1);

    let final_body = harness
        .matrix
        .sent_messages()
        .into_iter()
        .find(|(room, _)| room == "!room1:example.org")
        .map(|(_, body)| body)
        .expect("final reply posted");
    assert!(final_body.contains("Agendamento confirmado"));
    assert!(final_body.contains("14:30 BRT"));

    let cleanup_result = harness.cleanup.run(case_id).await.unwrap();
    assert_eq!(harness.store.case(case_id).status, CaseStatus::Cleaned);
    assert_eq!(cleanup_result.redacted_failed, 0);
    assert!(cleanup_result.redacted_success >= 6);
}

#[tokio::test]
async fn malformed_doctor_reply_gets_feedback_and_changes_nothing() {
    let harness = make_harness();
    let case_id = intake_case(&harness).await;
    harness.pipeline.run(case_id, "mxc://example.org/report1").await.unwrap();
    harness.room2_post.run(case_id).await.unwrap();

    let widget_event = harness
        .store
        .message_event_id(case_id, message_kind::BOT_WIDGET)
        .expect("widget posted");
    let outcome = harness
        .room2_reply
        .handle_reply(&ReplyEvent {
            room_id: ROOM2.to_owned(),
            event_id: "$bad-reply".to_owned(),
            sender: "@doctor:example.org".to_owned(),
            reply_to_event_id: widget_event,
            body: "decisao: talvez\nsuporte: nenhum\nmotivo: -\ncaso: ".to_owned()
                + &case_id.to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, Room2ReplyOutcome::Ignored("invalid_decision_value".to_owned()));
    assert_eq!(harness.store.case(case_id).status, CaseStatus::WaitDoctor);
    let feedback = harness
        .matrix
        .sent_messages()
        .into_iter()
        .filter(|(room, body)| room == ROOM2 && body.contains("invalid_decision_value"))
        .count();
    assert_eq!(feedback, 1);
}

#[tokio::test]
async fn malformed_scheduler_reply_triggers_strict_reprompt() {
    let harness = make_harness();
    let case_id = intake_case(&harness).await;
    harness.pipeline.run(case_id, "mxc://example.org/report1").await.unwrap();
    harness.room2_post.run(case_id).await.unwrap();
    harness.store.with_case(case_id, |case| case.status = CaseStatus::DoctorAccepted);
    harness.room3_post.run(case_id).await.unwrap();

    let template_event = harness
        .store
        .message_event_id(case_id, message_kind::ROOM3_TEMPLATE)
        .expect("template posted");
    let outcome = harness
        .room3_reply
        .handle_reply(&ReplyEvent {
            room_id: ROOM3.to_owned(),
            event_id: "$vague-reply".to_owned(),
            sender: "@scheduler:example.org".to_owned(),
            reply_to_event_id: template_event,
            body: format!("amanha cedo\nlocal: Sala\ninstrucoes: Jejum\ncaso: {case_id}"),
        })
        .await
        .unwrap();

    assert_eq!(outcome, Room3ReplyOutcome::Ignored("invalid_confirmed_datetime".to_owned()));
    assert_eq!(harness.store.case(case_id).status, CaseStatus::WaitScheduler);
    assert!(
        harness
            .matrix
            .sent_messages()
            .iter()
            .any(|(room, body)| room == ROOM3 && body.contains("Não consegui interpretar"))
    );
    assert_eq!(harness.store.events_of_type("ROOM3_REPLY_REJECTED").len(), 1);
}

#[tokio::test]
async fn denied_scheduling_flow_posts_denied_final() {
    let harness = make_harness();
    let case_id = intake_case(&harness).await;
    harness.pipeline.run(case_id, "mxc://example.org/report1").await.unwrap();
    harness.room2_post.run(case_id).await.unwrap();
    harness.store.with_case(case_id, |case| case.status = CaseStatus::DoctorAccepted);
    harness.room3_post.run(case_id).await.unwrap();

    let template_event = harness
        .store
        .message_event_id(case_id, message_kind::ROOM3_TEMPLATE)
        .expect("template posted");
    let outcome = harness
        .room3_reply
        .handle_reply(&ReplyEvent {
            room_id: ROOM3.to_owned(),
            event_id: "$denied-reply".to_owned(),
            sender: "@scheduler:example.org".to_owned(),
            reply_to_event_id: template_event,
            body: format!("negado\nmotivo: agenda cheia\ncaso: {case_id}"),
        })
        .await
        .unwrap();

    assert!(matches!(outcome, Room3ReplyOutcome::Applied(_)));
    let case = harness.store.case(case_id);
    assert_eq!(case.status, CaseStatus::ApptDenied);
    assert_eq!(case.appointment_reason.as_deref(), Some("agenda cheia"));
    assert_eq!(
        harness.store.queued_jobs_of_type(job_type::POST_ROOM1_FINAL_APPT_DENIED).len(),
        1
    );

    harness
        .room1_final
        .run(case_id, FinalReplyKind::ApptDenied, &serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(harness.store.case(case_id).status, CaseStatus::WaitR1CleanupThumbs);
}
