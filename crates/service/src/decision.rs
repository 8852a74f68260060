//! Doctor decision use-case shared by webhook, widget, and Room-2 replies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use triage_core::{CaseStatus, DoctorDecision, SupportFlag};
use triage_storage::{AuditStore, CaseStore, JobQueueStore, NewAuditEvent, NewJob, job_type};

use crate::error::ServiceError;

/// Decision payload accepted from every authenticated entrypoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionRequest {
    pub case_id: Uuid,
    pub doctor_user_id: String,
    pub decision: DoctorDecision,
    #[serde(default = "default_support_flag")]
    pub support_flag: SupportFlag,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub widget_event_id: Option<String>,
}

fn default_support_flag() -> SupportFlag {
    SupportFlag::None
}

impl DecisionRequest {
    /// Cross-field validation: a denial never carries support.
    pub fn validate(&self) -> Result<(), String> {
        if self.doctor_user_id.trim().is_empty() {
            return Err("doctor_user_id must not be empty".to_owned());
        }
        if self.decision == DoctorDecision::Deny && self.support_flag != SupportFlag::None {
            return Err("decision=deny requires support_flag=none".to_owned());
        }
        Ok(())
    }
}

/// Outcome set surfaced to HTTP and chat entrypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Applied,
    NotFound,
    /// Case is not in WAIT_DOCTOR. `already_recorded` marks the idempotent
    /// repeat of the decision that already won.
    WrongState {
        already_recorded: bool,
    },
}

/// Apply a doctor decision to a waiting case.
pub struct HandleDoctorDecisionService {
    cases: Arc<dyn CaseStore>,
    audit: Arc<dyn AuditStore>,
    queue: Arc<dyn JobQueueStore>,
}

impl HandleDoctorDecisionService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        audit: Arc<dyn AuditStore>,
        queue: Arc<dyn JobQueueStore>,
    ) -> Self {
        Self { cases, audit, queue }
    }

    pub async fn handle(&self, request: &DecisionRequest) -> Result<DecisionOutcome, ServiceError> {
        let Some(case) = self.cases.get_case(request.case_id).await? else {
            return Ok(DecisionOutcome::NotFound);
        };

        if case.status != CaseStatus::WaitDoctor {
            let already_recorded = case.doctor_decision == Some(request.decision)
                && case.doctor_support_flag == Some(request.support_flag);
            return Ok(DecisionOutcome::WrongState { already_recorded });
        }

        let new_status = match request.decision {
            DoctorDecision::Accept => CaseStatus::DoctorAccepted,
            DoctorDecision::Deny => CaseStatus::DoctorDenied,
        };
        let decided_at = request.submitted_at.unwrap_or_else(Utc::now);

        let applied = self
            .cases
            .apply_doctor_decision(
                request.case_id,
                request.decision,
                request.support_flag,
                request.reason.as_deref(),
                decided_at,
                new_status,
            )
            .await?;
        if !applied {
            // Lost the race against another entrypoint.
            let case = self.cases.get_case(request.case_id).await?;
            let already_recorded = case
                .map(|c| {
                    c.doctor_decision == Some(request.decision)
                        && c.doctor_support_flag == Some(request.support_flag)
                })
                .unwrap_or(false);
            return Ok(DecisionOutcome::WrongState { already_recorded });
        }

        self.audit
            .append_event(NewAuditEvent {
                case_id: request.case_id,
                actor_type: triage_core::ActorType::Human,
                event_type: "DOCTOR_DECISION_RECORDED".to_owned(),
                payload: json!({
                    "doctor_user_id": request.doctor_user_id,
                    "decision": request.decision.as_str(),
                    "support_flag": request.support_flag.as_str(),
                    "reason": request.reason,
                    "widget_event_id": request.widget_event_id,
                }),
                room_id: None,
                matrix_event_id: request.widget_event_id.clone(),
            })
            .await?;

        let next_job_type = match request.decision {
            DoctorDecision::Accept => job_type::POST_ROOM3_REQUEST,
            DoctorDecision::Deny => job_type::POST_ROOM1_FINAL_DENIAL_TRIAGE,
        };
        if !self.queue.has_active_job(request.case_id, next_job_type).await? {
            self.queue
                .enqueue(NewJob::now(next_job_type, Some(request.case_id), json!({})))
                .await?;
        }

        tracing::info!(
            case_id = %request.case_id,
            decision = request.decision.as_str(),
            next_job = next_job_type,
            "doctor decision applied"
        );
        Ok(DecisionOutcome::Applied)
    }
}
