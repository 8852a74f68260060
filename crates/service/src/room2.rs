//! Room-2 widget posting and doctor reply routing.

use std::sync::Arc;

use serde_json::{Value, json};
use uuid::Uuid;

use triage_core::{
    CaseStatus, Suggestion, SupportFlag, parse_doctor_decision_reply, patient,
};
use triage_matrix::templates;
use triage_matrix::{MatrixClient, ReplyEvent};
use triage_storage::{
    AuditStore, CaseStore, MessageStore, NewAuditEvent, NewCaseMessage, NewMatrixTranscript,
    PriorCaseStore, TranscriptDirection, TranscriptStore, message_kind,
};

use crate::decision::{DecisionOutcome, DecisionRequest, HandleDoctorDecisionService};
use crate::error::ServiceError;

/// Post the Room-2 review sequence and arm the strict-reply root message.
pub struct PostRoom2WidgetService {
    cases: Arc<dyn CaseStore>,
    messages: Arc<dyn MessageStore>,
    audit: Arc<dyn AuditStore>,
    transcripts: Arc<dyn TranscriptStore>,
    prior_cases: Arc<dyn PriorCaseStore>,
    matrix: Arc<dyn MatrixClient>,
    room2_id: String,
}

impl PostRoom2WidgetService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cases: Arc<dyn CaseStore>,
        messages: Arc<dyn MessageStore>,
        audit: Arc<dyn AuditStore>,
        transcripts: Arc<dyn TranscriptStore>,
        prior_cases: Arc<dyn PriorCaseStore>,
        matrix: Arc<dyn MatrixClient>,
        room2_id: String,
    ) -> Self {
        Self { cases, messages, audit, transcripts, prior_cases, matrix, room2_id }
    }

    pub async fn run(&self, case_id: Uuid) -> Result<(), ServiceError> {
        let Some(case) = self.cases.get_case(case_id).await? else {
            return Err(ServiceError::CaseNotFound(case_id));
        };
        if case.status != CaseStatus::R2PostWidget {
            tracing::info!(case_id = %case_id, status = %case.status, "case not awaiting widget post, skipping");
            return Ok(());
        }

        let record = case.agency_record_number.as_deref();
        let (patient_name, _) = patient::extract_patient_name_age(case.structured_data.as_ref());
        let patient_name = patient_name.as_deref();

        let prior_context = self
            .prior_cases
            .lookup_recent_context(
                case_id,
                case.agency_record_number.as_deref().unwrap_or(""),
                chrono::Utc::now(),
            )
            .await?;

        // Widget payload: machine-readable context for the bootstrap
        // endpoint, kept in the audit trail rather than dumped into chat.
        let widget_payload = json!({
            "case_id": case_id,
            "agency_record_number": case.agency_record_number,
            "structured_data": case.structured_data,
            "summary_text": case.summary_text,
            "suggested_action": case.suggested_action,
            "prior_case": prior_context.prior_case,
            "prior_denial_count_7d": prior_context.prior_denial_count_7d,
        });

        let pdf_body = templates::build_room2_case_pdf_message(
            record,
            patient_name,
            case.extracted_text.as_deref().unwrap_or(""),
        );
        let pdf_html = templates::build_room2_case_pdf_formatted_html(
            record,
            patient_name,
            case.extracted_text.as_deref().unwrap_or(""),
        );
        let pdf_event_id = self
            .post_once(
                case_id,
                message_kind::ROOM2_PDF,
                &pdf_body,
                Some(&pdf_html),
            )
            .await?;

        let (suggestion, support, short_reason) = suggested_fields(case.suggested_action.as_ref());
        let summary_body = templates::build_room2_case_summary_message(
            record,
            patient_name,
            case.summary_text.as_deref(),
            suggestion,
            support,
            short_reason.as_deref(),
            &critical_findings(case.structured_data.as_ref()),
            &critical_pending(case.structured_data.as_ref()),
        );
        self.post_once(case_id, message_kind::ROOM2_SUMMARY, &summary_body, None).await?;

        let instructions_body =
            templates::build_room2_case_decision_instructions_message(record, patient_name);
        let instructions_html =
            templates::build_room2_case_decision_instructions_formatted_html(record, patient_name);
        self.post_once(
            case_id,
            message_kind::ROOM2_INSTRUCTIONS,
            &instructions_body,
            Some(&instructions_html),
        )
        .await?;

        let template_body = templates::build_room2_case_decision_template_message(case_id);
        let template_html = templates::build_room2_case_decision_template_formatted_html(case_id);
        let template_event_id = self
            .post_once(case_id, message_kind::BOT_WIDGET, &template_body, Some(&template_html))
            .await?;

        self.audit
            .append_event(NewAuditEvent {
                case_id,
                actor_type: triage_core::ActorType::Bot,
                event_type: "ROOM2_WIDGET_POSTED".to_owned(),
                payload: widget_payload,
                room_id: Some(self.room2_id.clone()),
                matrix_event_id: template_event_id.or(pdf_event_id),
            })
            .await?;

        let moved = self
            .cases
            .transition_status(case_id, CaseStatus::R2PostWidget, CaseStatus::WaitDoctor)
            .await?;
        if moved {
            self.audit
                .append_event(NewAuditEvent::system(
                    case_id,
                    "CASE_STATUS_CHANGED",
                    json!({
                        "from": CaseStatus::R2PostWidget.as_str(),
                        "to": CaseStatus::WaitDoctor.as_str(),
                    }),
                ))
                .await?;
        }

        tracing::info!(case_id = %case_id, "Room-2 widget sequence posted");
        Ok(())
    }

    /// Post one message of the sequence unless an earlier attempt already
    /// delivered it (retried jobs must not double-post).
    async fn post_once(
        &self,
        case_id: Uuid,
        kind: &str,
        body: &str,
        html: Option<&str>,
    ) -> Result<Option<String>, ServiceError> {
        if self.messages.has_message_kind(case_id, &self.room2_id, kind).await? {
            return Ok(None);
        }

        let event_id = match html {
            Some(html) => self.matrix.send_formatted(&self.room2_id, body, html).await?,
            None => self.matrix.send_text(&self.room2_id, body).await?,
        };

        self.messages
            .add_message(NewCaseMessage {
                case_id,
                room_id: self.room2_id.clone(),
                event_id: event_id.clone(),
                kind: kind.to_owned(),
                sender_user_id: None,
            })
            .await?;
        self.transcripts
            .append_matrix_transcript(NewMatrixTranscript {
                case_id,
                room_id: self.room2_id.clone(),
                event_id: event_id.clone(),
                direction: TranscriptDirection::Outbound,
                sender_user_id: None,
                body: body.to_owned(),
            })
            .await?;
        Ok(Some(event_id))
    }
}

/// Route Room-2 doctor replies through the shared decision use-case.
pub struct Room2ReplyService {
    cases: Arc<dyn CaseStore>,
    messages: Arc<dyn MessageStore>,
    matrix: Arc<dyn MatrixClient>,
    decision_service: Arc<HandleDoctorDecisionService>,
    room2_id: String,
}

/// Outcome of one reply-handling attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Room2ReplyOutcome {
    Applied,
    Ignored(String),
}

impl Room2ReplyService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        messages: Arc<dyn MessageStore>,
        matrix: Arc<dyn MatrixClient>,
        decision_service: Arc<HandleDoctorDecisionService>,
        room2_id: String,
    ) -> Self {
        Self { cases, messages, matrix, decision_service, room2_id }
    }

    pub async fn handle_reply(&self, reply: &ReplyEvent) -> Result<Room2ReplyOutcome, ServiceError> {
        if reply.room_id != self.room2_id {
            return Ok(Room2ReplyOutcome::Ignored("wrong_room".to_owned()));
        }

        // The reply must target the copy-paste template the bot posted.
        let Some(case_id) = self
            .messages
            .find_case_by_room_event_kind(
                &self.room2_id,
                &reply.reply_to_event_id,
                message_kind::BOT_WIDGET,
            )
            .await?
        else {
            return Ok(Room2ReplyOutcome::Ignored("not_a_widget_reply".to_owned()));
        };

        let parsed = match parse_doctor_decision_reply(&reply.body, Some(case_id)) {
            Ok(parsed) => parsed,
            Err(error) => {
                let feedback = templates::build_room2_decision_error_message(error.reason());
                self.matrix.send_text(&self.room2_id, &feedback).await?;
                return Ok(Room2ReplyOutcome::Ignored(error.reason().to_owned()));
            }
        };

        // The Matrix sender identity is authoritative for doctor attribution.
        let request = DecisionRequest {
            case_id,
            doctor_user_id: reply.sender.clone(),
            decision: parsed.decision,
            support_flag: parsed.support_flag,
            reason: parsed.reason,
            submitted_at: None,
            widget_event_id: Some(reply.event_id.clone()),
        };

        match self.decision_service.handle(&request).await? {
            DecisionOutcome::Applied => {
                let decision_ptbr = match parsed.decision {
                    triage_core::DoctorDecision::Accept => "aceitar",
                    triage_core::DoctorDecision::Deny => "negar",
                };
                let case = self.cases.get_case(case_id).await?;
                let (patient_name, _) = patient::extract_patient_name_age(
                    case.as_ref().and_then(|c| c.structured_data.as_ref()),
                );
                let ack_body = templates::build_room2_decision_ack_message(
                    case.as_ref().and_then(|c| c.agency_record_number.as_deref()),
                    patient_name.as_deref(),
                    decision_ptbr,
                );
                let ack_event_id = self.matrix.send_text(&self.room2_id, &ack_body).await?;
                self.messages
                    .add_message(NewCaseMessage {
                        case_id,
                        room_id: self.room2_id.clone(),
                        event_id: ack_event_id,
                        kind: message_kind::BOT_ACK.to_owned(),
                        sender_user_id: None,
                    })
                    .await?;
                Ok(Room2ReplyOutcome::Applied)
            }
            DecisionOutcome::NotFound => Ok(Room2ReplyOutcome::Ignored("not_found".to_owned())),
            DecisionOutcome::WrongState { .. } => {
                Ok(Room2ReplyOutcome::Ignored("wrong_state".to_owned()))
            }
        }
    }
}

fn suggested_fields(
    suggested_action: Option<&Value>,
) -> (Option<Suggestion>, Option<SupportFlag>, Option<String>) {
    let Some(suggested) = suggested_action else {
        return (None, None, None);
    };
    let suggestion = match suggested.get("suggestion").and_then(Value::as_str) {
        Some("accept") => Some(Suggestion::Accept),
        Some("deny") => Some(Suggestion::Deny),
        _ => None,
    };
    let support = match suggested.get("support_recommendation").and_then(Value::as_str) {
        Some("none") => Some(SupportFlag::None),
        Some("anesthesist") => Some(SupportFlag::Anesthesist),
        Some("anesthesist_icu") => Some(SupportFlag::AnesthesistIcu),
        _ => None,
    };
    let short_reason = suggested
        .get("rationale")
        .and_then(|rationale| rationale.get("short_reason"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    (suggestion, support, short_reason)
}

fn critical_findings(structured_data: Option<&Value>) -> Vec<String> {
    let mut findings = Vec::new();
    let Some(data) = structured_data else {
        return findings;
    };
    if let Some(items) = data
        .get("policy_precheck")
        .and_then(|p| p.get("labs_failed_items"))
        .and_then(Value::as_array)
    {
        for item in items {
            if let Some(text) = item.as_str() {
                findings.push(format!("laboratório: {text}"));
            }
        }
    }
    if data
        .get("eda")
        .and_then(|eda| eda.get("ecg"))
        .and_then(|ecg| ecg.get("abnormal_flag"))
        .and_then(Value::as_str)
        == Some("yes")
    {
        findings.push("ECG com alteração sinalizada".to_owned());
    }
    if data
        .get("policy_precheck")
        .and_then(|p| p.get("excluded_from_eda_flow"))
        .and_then(Value::as_bool)
        == Some(true)
    {
        findings.push("solicitação fora do fluxo de EDA".to_owned());
    }
    findings
}

fn critical_pending(structured_data: Option<&Value>) -> Vec<String> {
    let Some(items) = structured_data
        .and_then(|data| data.get("extraction_quality"))
        .and_then(|quality| quality.get("missing_fields"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(|field| format!("campo ausente: {field}"))
        .collect()
}
