//! Room-1 final replies: appointment outcome, triage denial, or failure.
//!
//! Every final reply routes the case into the cleanup chain: status moves to
//! WAIT_R1_CLEANUP_THUMBS, `cleanup_triggered_at` is stamped, and the
//! `execute_cleanup` job is enqueued.

use std::sync::Arc;

use serde_json::{Value, json};
use uuid::Uuid;

use triage_core::{CaseStatus, patient};
use triage_matrix::MatrixClient;
use triage_matrix::templates;
use triage_storage::{
    AuditStore, CaseRecord, CaseStore, JobQueueStore, MessageStore, NewAuditEvent,
    NewCaseMessage, NewJob, NewMatrixTranscript, TranscriptDirection, TranscriptStore, job_type,
    message_kind,
};

use crate::error::ServiceError;

/// Which final reply a job asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalReplyKind {
    ApptConfirmed,
    ApptDenied,
    DenialTriage,
    Failure,
}

impl FinalReplyKind {
    /// Case status this final reply departs from.
    fn expected_status(&self) -> CaseStatus {
        match self {
            Self::ApptConfirmed => CaseStatus::ApptConfirmed,
            Self::ApptDenied => CaseStatus::ApptDenied,
            Self::DenialTriage => CaseStatus::DoctorDenied,
            Self::Failure => CaseStatus::Failed,
        }
    }

    fn audit_event_type(&self) -> &'static str {
        match self {
            Self::ApptConfirmed => "ROOM1_FINAL_APPT_POSTED",
            Self::ApptDenied => "ROOM1_FINAL_APPT_DENIED_POSTED",
            Self::DenialTriage => "ROOM1_FINAL_DENIAL_TRIAGE_POSTED",
            Self::Failure => "ROOM1_FINAL_FAILURE_POSTED",
        }
    }
}

/// Post the final Room-1 reply for a finished case and trigger cleanup.
pub struct Room1FinalService {
    cases: Arc<dyn CaseStore>,
    messages: Arc<dyn MessageStore>,
    audit: Arc<dyn AuditStore>,
    transcripts: Arc<dyn TranscriptStore>,
    queue: Arc<dyn JobQueueStore>,
    matrix: Arc<dyn MatrixClient>,
}

impl Room1FinalService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        messages: Arc<dyn MessageStore>,
        audit: Arc<dyn AuditStore>,
        transcripts: Arc<dyn TranscriptStore>,
        queue: Arc<dyn JobQueueStore>,
        matrix: Arc<dyn MatrixClient>,
    ) -> Self {
        Self { cases, messages, audit, transcripts, queue, matrix }
    }

    pub async fn run(
        &self,
        case_id: Uuid,
        kind: FinalReplyKind,
        job_payload: &Value,
    ) -> Result<(), ServiceError> {
        let Some(case) = self.cases.get_case(case_id).await? else {
            return Err(ServiceError::CaseNotFound(case_id));
        };

        let expected = kind.expected_status();
        if case.status != expected {
            if case.status == CaseStatus::WaitR1CleanupThumbs
                || case.status == CaseStatus::CleanupRunning
                || case.status == CaseStatus::Cleaned
            {
                tracing::info!(case_id = %case_id, status = %case.status, "final reply already handled, skipping");
                return Ok(());
            }
            tracing::info!(
                case_id = %case_id,
                status = %case.status,
                expected = %expected,
                "case not ready for this final reply, skipping"
            );
            return Ok(());
        }

        let body = build_body(&case, kind, job_payload)?;
        let room1_id = case.room1_origin_room_id.clone();

        if !self.messages.has_message_kind(case_id, &room1_id, message_kind::ROOM1_FINAL).await? {
            let event_id = self.matrix.send_text(&room1_id, &body).await?;
            self.messages
                .add_message(NewCaseMessage {
                    case_id,
                    room_id: room1_id.clone(),
                    event_id: event_id.clone(),
                    kind: message_kind::ROOM1_FINAL.to_owned(),
                    sender_user_id: None,
                })
                .await?;
            self.transcripts
                .append_matrix_transcript(NewMatrixTranscript {
                    case_id,
                    room_id: room1_id.clone(),
                    event_id: event_id.clone(),
                    direction: TranscriptDirection::Outbound,
                    sender_user_id: None,
                    body: body.clone(),
                })
                .await?;
            self.audit
                .append_event(NewAuditEvent {
                    case_id,
                    actor_type: triage_core::ActorType::Bot,
                    event_type: kind.audit_event_type().to_owned(),
                    payload: job_payload.clone(),
                    room_id: Some(room1_id.clone()),
                    matrix_event_id: Some(event_id),
                })
                .await?;
        }

        let moved = self
            .cases
            .transition_status(case_id, expected, CaseStatus::WaitR1CleanupThumbs)
            .await?;
        if moved {
            self.audit
                .append_event(NewAuditEvent::system(
                    case_id,
                    "CASE_STATUS_CHANGED",
                    json!({
                        "from": expected.as_str(),
                        "to": CaseStatus::WaitR1CleanupThumbs.as_str(),
                    }),
                ))
                .await?;
        }

        self.cases.mark_cleanup_triggered(case_id).await?;
        if !self.queue.has_active_job(case_id, job_type::EXECUTE_CLEANUP).await? {
            self.queue
                .enqueue(NewJob::now(job_type::EXECUTE_CLEANUP, Some(case_id), json!({})))
                .await?;
        }

        tracing::info!(case_id = %case_id, kind = ?kind, "Room-1 final reply posted, cleanup enqueued");
        Ok(())
    }
}

fn build_body(
    case: &CaseRecord,
    kind: FinalReplyKind,
    job_payload: &Value,
) -> Result<String, ServiceError> {
    let record = case.agency_record_number.as_deref();
    let (patient_name, patient_age) =
        patient::extract_patient_name_age(case.structured_data.as_ref());
    let requested_exam = patient::extract_requested_exam(case.structured_data.as_ref());

    let body = match kind {
        FinalReplyKind::ApptConfirmed => {
            let appointment_at = case.appointment_at.ok_or_else(|| {
                ServiceError::InvalidPayload("confirmed case without appointment_at".to_owned())
            })?;
            templates::build_room1_final_accepted_message(
                record,
                patient_name.as_deref(),
                patient_age.as_deref(),
                requested_exam.as_deref(),
                appointment_at,
                case.location.as_deref().unwrap_or("(vazio)"),
                case.instructions.as_deref().unwrap_or("(vazio)"),
            )
        }
        FinalReplyKind::ApptDenied => templates::build_room1_final_appt_denied_message(
            record,
            patient_name.as_deref(),
            patient_age.as_deref(),
            requested_exam.as_deref(),
            case.appointment_reason.as_deref(),
        ),
        FinalReplyKind::DenialTriage => templates::build_room1_final_denial_triage_message(
            record,
            patient_name.as_deref(),
            patient_age.as_deref(),
            requested_exam.as_deref(),
            case.doctor_reason.as_deref(),
        ),
        FinalReplyKind::Failure => {
            let cause = job_payload.get("cause").and_then(Value::as_str).unwrap_or("other");
            let details = job_payload.get("details").and_then(Value::as_str).unwrap_or("");
            templates::build_room1_final_failure_message(
                record,
                patient_name.as_deref(),
                patient_age.as_deref(),
                requested_exam.as_deref(),
                cause,
                details,
            )
        }
    };
    Ok(body)
}
