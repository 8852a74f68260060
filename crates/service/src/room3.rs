//! Room-3 scheduling request posting and scheduler reply handling.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use triage_core::{AppointmentStatus, CaseStatus, parse_scheduler_reply, patient};
use triage_matrix::templates;
use triage_matrix::{MatrixClient, ReplyEvent};
use triage_storage::{
    AuditStore, CaseStore, JobQueueStore, MessageStore, NewAuditEvent, NewCaseMessage,
    NewJob, NewMatrixTranscript, TranscriptDirection, TranscriptStore, job_type, message_kind,
};

use crate::error::ServiceError;

/// Post the scheduling request and arm the strict-reply template.
pub struct PostRoom3RequestService {
    cases: Arc<dyn CaseStore>,
    messages: Arc<dyn MessageStore>,
    audit: Arc<dyn AuditStore>,
    transcripts: Arc<dyn TranscriptStore>,
    matrix: Arc<dyn MatrixClient>,
    room3_id: String,
}

impl PostRoom3RequestService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        messages: Arc<dyn MessageStore>,
        audit: Arc<dyn AuditStore>,
        transcripts: Arc<dyn TranscriptStore>,
        matrix: Arc<dyn MatrixClient>,
        room3_id: String,
    ) -> Self {
        Self { cases, messages, audit, transcripts, matrix, room3_id }
    }

    pub async fn run(&self, case_id: Uuid) -> Result<(), ServiceError> {
        let Some(case) = self.cases.get_case(case_id).await? else {
            return Err(ServiceError::CaseNotFound(case_id));
        };

        match case.status {
            CaseStatus::DoctorAccepted => {
                let moved = self
                    .cases
                    .transition_status(
                        case_id,
                        CaseStatus::DoctorAccepted,
                        CaseStatus::R3PostRequest,
                    )
                    .await?;
                if moved {
                    self.audit
                        .append_event(NewAuditEvent::system(
                            case_id,
                            "CASE_STATUS_CHANGED",
                            json!({
                                "from": CaseStatus::DoctorAccepted.as_str(),
                                "to": CaseStatus::R3PostRequest.as_str(),
                            }),
                        ))
                        .await?;
                }
            }
            CaseStatus::R3PostRequest => {}
            other => {
                tracing::info!(case_id = %case_id, status = %other, "case not awaiting Room-3 request, skipping");
                return Ok(());
            }
        }

        let record = case.agency_record_number.as_deref();
        let (patient_name, patient_age) =
            patient::extract_patient_name_age(case.structured_data.as_ref());
        let requested_exam = patient::extract_requested_exam(case.structured_data.as_ref());

        let request_body = templates::build_room3_request_message(
            record,
            patient_name.as_deref(),
            patient_age.as_deref(),
            requested_exam.as_deref(),
        );
        self.post_once(case_id, message_kind::ROOM3_REQUEST, &request_body).await?;

        let template_body = templates::build_room3_reply_template_message(
            case_id,
            record,
            patient_name.as_deref(),
        );
        let template_event_id =
            self.post_once(case_id, message_kind::ROOM3_TEMPLATE, &template_body).await?;

        self.audit
            .append_event(NewAuditEvent {
                case_id,
                actor_type: triage_core::ActorType::Bot,
                event_type: "ROOM3_REQUEST_POSTED".to_owned(),
                payload: json!({}),
                room_id: Some(self.room3_id.clone()),
                matrix_event_id: template_event_id,
            })
            .await?;

        let moved = self
            .cases
            .transition_status(case_id, CaseStatus::R3PostRequest, CaseStatus::WaitScheduler)
            .await?;
        if moved {
            self.audit
                .append_event(NewAuditEvent::system(
                    case_id,
                    "CASE_STATUS_CHANGED",
                    json!({
                        "from": CaseStatus::R3PostRequest.as_str(),
                        "to": CaseStatus::WaitScheduler.as_str(),
                    }),
                ))
                .await?;
        }

        tracing::info!(case_id = %case_id, "Room-3 scheduling request posted");
        Ok(())
    }

    async fn post_once(
        &self,
        case_id: Uuid,
        kind: &str,
        body: &str,
    ) -> Result<Option<String>, ServiceError> {
        if self.messages.has_message_kind(case_id, &self.room3_id, kind).await? {
            return Ok(None);
        }
        let event_id = self.matrix.send_text(&self.room3_id, body).await?;
        self.messages
            .add_message(NewCaseMessage {
                case_id,
                room_id: self.room3_id.clone(),
                event_id: event_id.clone(),
                kind: kind.to_owned(),
                sender_user_id: None,
            })
            .await?;
        self.transcripts
            .append_matrix_transcript(NewMatrixTranscript {
                case_id,
                room_id: self.room3_id.clone(),
                event_id: event_id.clone(),
                direction: TranscriptDirection::Outbound,
                sender_user_id: None,
                body: body.to_owned(),
            })
            .await?;
        Ok(Some(event_id))
    }
}

/// Outcome of one scheduler reply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Room3ReplyOutcome {
    Applied(AppointmentStatus),
    Ignored(String),
}

/// Parse scheduler replies and finalize the appointment outcome.
pub struct Room3SchedulerReplyService {
    cases: Arc<dyn CaseStore>,
    messages: Arc<dyn MessageStore>,
    audit: Arc<dyn AuditStore>,
    transcripts: Arc<dyn TranscriptStore>,
    queue: Arc<dyn JobQueueStore>,
    matrix: Arc<dyn MatrixClient>,
    room3_id: String,
}

impl Room3SchedulerReplyService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cases: Arc<dyn CaseStore>,
        messages: Arc<dyn MessageStore>,
        audit: Arc<dyn AuditStore>,
        transcripts: Arc<dyn TranscriptStore>,
        queue: Arc<dyn JobQueueStore>,
        matrix: Arc<dyn MatrixClient>,
        room3_id: String,
    ) -> Self {
        Self { cases, messages, audit, transcripts, queue, matrix, room3_id }
    }

    pub async fn handle_reply(
        &self,
        reply: &ReplyEvent,
    ) -> Result<Room3ReplyOutcome, ServiceError> {
        if reply.room_id != self.room3_id {
            return Ok(Room3ReplyOutcome::Ignored("wrong_room".to_owned()));
        }

        let Some(case_id) = self
            .messages
            .find_case_by_room_event_kind(
                &self.room3_id,
                &reply.reply_to_event_id,
                message_kind::ROOM3_TEMPLATE,
            )
            .await?
        else {
            return Ok(Room3ReplyOutcome::Ignored("not_a_template_reply".to_owned()));
        };

        self.transcripts
            .append_matrix_transcript(NewMatrixTranscript {
                case_id,
                room_id: self.room3_id.clone(),
                event_id: reply.event_id.clone(),
                direction: TranscriptDirection::Inbound,
                sender_user_id: Some(reply.sender.clone()),
                body: reply.body.clone(),
            })
            .await?;

        let parsed = match parse_scheduler_reply(&reply.body, case_id) {
            Ok(parsed) => parsed,
            Err(error) => {
                let case = self.cases.get_case(case_id).await?;
                let (patient_name, _) = patient::extract_patient_name_age(
                    case.as_ref().and_then(|c| c.structured_data.as_ref()),
                );
                let reprompt = templates::build_room3_invalid_format_reprompt(
                    case_id,
                    case.as_ref().and_then(|c| c.agency_record_number.as_deref()),
                    patient_name.as_deref(),
                );
                self.matrix.send_text(&self.room3_id, &reprompt).await?;
                self.audit
                    .append_event(NewAuditEvent {
                        case_id,
                        actor_type: triage_core::ActorType::System,
                        event_type: "ROOM3_REPLY_REJECTED".to_owned(),
                        payload: json!({"reason": error.reason()}),
                        room_id: Some(self.room3_id.clone()),
                        matrix_event_id: Some(reply.event_id.clone()),
                    })
                    .await?;
                return Ok(Room3ReplyOutcome::Ignored(error.reason().to_owned()));
            }
        };

        let (new_status, next_job) = match parsed.appointment_status {
            AppointmentStatus::Confirmed => {
                (CaseStatus::ApptConfirmed, job_type::POST_ROOM1_FINAL_APPT)
            }
            AppointmentStatus::Denied => {
                (CaseStatus::ApptDenied, job_type::POST_ROOM1_FINAL_APPT_DENIED)
            }
        };

        let applied = self
            .cases
            .apply_scheduler_outcome(
                case_id,
                parsed.appointment_status,
                parsed.appointment_at,
                parsed.location.as_deref(),
                parsed.instructions.as_deref(),
                parsed.reason.as_deref(),
                new_status,
            )
            .await?;
        if !applied {
            return Ok(Room3ReplyOutcome::Ignored("wrong_state".to_owned()));
        }

        self.audit
            .append_event(NewAuditEvent {
                case_id,
                actor_type: triage_core::ActorType::Human,
                event_type: "SCHEDULER_REPLY_RECORDED".to_owned(),
                payload: json!({
                    "appointment_status": parsed.appointment_status.as_str(),
                    "appointment_at": parsed.appointment_at,
                    "location": parsed.location,
                    "instructions": parsed.instructions,
                    "reason": parsed.reason,
                    "sender_user_id": reply.sender,
                }),
                room_id: Some(self.room3_id.clone()),
                matrix_event_id: Some(reply.event_id.clone()),
            })
            .await?;

        let case = self.cases.get_case(case_id).await?;
        let (patient_name, patient_age) = patient::extract_patient_name_age(
            case.as_ref().and_then(|c| c.structured_data.as_ref()),
        );
        let requested_exam = patient::extract_requested_exam(
            case.as_ref().and_then(|c| c.structured_data.as_ref()),
        );
        let ack_body = templates::build_room3_ack_message(
            case.as_ref().and_then(|c| c.agency_record_number.as_deref()),
            patient_name.as_deref(),
            patient_age.as_deref(),
            requested_exam.as_deref(),
        );
        let ack_event_id = self.matrix.send_text(&self.room3_id, &ack_body).await?;
        self.messages
            .add_message(NewCaseMessage {
                case_id,
                room_id: self.room3_id.clone(),
                event_id: ack_event_id,
                kind: message_kind::ROOM3_ACK.to_owned(),
                sender_user_id: None,
            })
            .await?;

        if !self.queue.has_active_job(case_id, next_job).await? {
            self.queue.enqueue(NewJob::now(next_job, Some(case_id), json!({}))).await?;
        }

        tracing::info!(
            case_id = %case_id,
            outcome = parsed.appointment_status.as_str(),
            "scheduler reply applied"
        );
        Ok(Room3ReplyOutcome::Applied(parsed.appointment_status))
    }
}
