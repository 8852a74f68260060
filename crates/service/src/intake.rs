//! Room-1 intake: a posted PDF report originates a case.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use triage_core::CaseStatus;
use triage_matrix::PdfOriginEvent;
use triage_storage::{
    AuditStore, CaseStore, JobQueueStore, MessageStore, NewAuditEvent, NewCase, NewCaseMessage,
    NewJob, StorageError, job_type, message_kind,
};

use crate::error::ServiceError;

/// Result of one intake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    Created(Uuid),
    /// The origin event already belongs to a case.
    Duplicate,
}

/// Create cases from Room-1 PDF attachments and enqueue the pipeline.
pub struct Room1IntakeService {
    cases: Arc<dyn CaseStore>,
    messages: Arc<dyn MessageStore>,
    audit: Arc<dyn AuditStore>,
    queue: Arc<dyn JobQueueStore>,
}

impl Room1IntakeService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        messages: Arc<dyn MessageStore>,
        audit: Arc<dyn AuditStore>,
        queue: Arc<dyn JobQueueStore>,
    ) -> Self {
        Self { cases, messages, audit, queue }
    }

    pub async fn handle_pdf_event(
        &self,
        event: &PdfOriginEvent,
    ) -> Result<IntakeOutcome, ServiceError> {
        let case_id = Uuid::new_v4();
        let created = self
            .cases
            .create_case(NewCase {
                case_id,
                status: CaseStatus::New,
                room1_origin_room_id: event.room_id.clone(),
                room1_origin_event_id: event.event_id.clone(),
                room1_sender_user_id: event.sender.clone(),
            })
            .await;

        match created {
            Ok(_) => {}
            Err(StorageError::Duplicate(_)) => {
                tracing::debug!(
                    room_id = %event.room_id,
                    event_id = %event.event_id,
                    "origin event already mapped to a case, skipping"
                );
                return Ok(IntakeOutcome::Duplicate);
            }
            Err(error) => return Err(error.into()),
        }

        self.messages
            .add_message(NewCaseMessage {
                case_id,
                room_id: event.room_id.clone(),
                event_id: event.event_id.clone(),
                kind: message_kind::ROOM1_ORIGIN.to_owned(),
                sender_user_id: Some(event.sender.clone()),
            })
            .await?;

        self.audit
            .append_event(NewAuditEvent {
                case_id,
                actor_type: triage_core::ActorType::Human,
                event_type: "CASE_CREATED".to_owned(),
                payload: json!({
                    "pdf_mxc_url": event.pdf_mxc_url,
                    "filename": event.filename,
                    "sender_user_id": event.sender,
                }),
                room_id: Some(event.room_id.clone()),
                matrix_event_id: Some(event.event_id.clone()),
            })
            .await?;

        self.queue
            .enqueue(NewJob::now(
                job_type::PROCESS_PDF_CASE,
                Some(case_id),
                json!({"pdf_mxc_url": event.pdf_mxc_url}),
            ))
            .await?;

        tracing::info!(case_id = %case_id, event_id = %event.event_id, "case created from Room-1 PDF");
        Ok(IntakeOutcome::Created(case_id))
    }
}
