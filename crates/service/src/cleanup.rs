//! Cleanup executor: redact every tracked chat event for a case.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use triage_core::CaseStatus;
use triage_matrix::{MatrixClient, MatrixError};
use triage_storage::{AuditStore, CaseStore, MessageStore, NewAuditEvent};

use crate::error::ServiceError;
use crate::ports::Sleeper;

const MIN_RETRY_DELAY: Duration = Duration::from_millis(200);
const MAX_REDACTION_ATTEMPTS: u32 = 5;

/// Outcome accounting for one cleanup execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupResult {
    pub redacted_success: u32,
    pub redacted_failed: u32,
}

/// Redact all case messages and finalize the case as CLEANED.
///
/// Individual redactions are independent, so this is the one handler with
/// per-item partial-failure accounting instead of fail-fast semantics.
pub struct ExecuteCleanupService {
    cases: Arc<dyn CaseStore>,
    messages: Arc<dyn MessageStore>,
    audit: Arc<dyn AuditStore>,
    matrix: Arc<dyn MatrixClient>,
    sleeper: Arc<dyn Sleeper>,
}

impl ExecuteCleanupService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        messages: Arc<dyn MessageStore>,
        audit: Arc<dyn AuditStore>,
        matrix: Arc<dyn MatrixClient>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self { cases, messages, audit, matrix, sleeper }
    }

    pub async fn run(&self, case_id: Uuid) -> Result<CleanupResult, ServiceError> {
        let Some(case) = self.cases.get_case(case_id).await? else {
            return Err(ServiceError::CaseNotFound(case_id));
        };
        if case.status == CaseStatus::Cleaned {
            tracing::info!(case_id = %case_id, "case already cleaned, skipping");
            return Ok(CleanupResult { redacted_success: 0, redacted_failed: 0 });
        }

        if case.status != CaseStatus::CleanupRunning {
            if !case.status.allows_transition_to(CaseStatus::CleanupRunning) {
                tracing::info!(case_id = %case_id, status = %case.status, "case not in the cleanup chain, skipping");
                return Ok(CleanupResult { redacted_success: 0, redacted_failed: 0 });
            }
            let moved = self
                .cases
                .transition_status(case_id, case.status, CaseStatus::CleanupRunning)
                .await?;
            if moved {
                self.audit
                    .append_event(NewAuditEvent::system(
                        case_id,
                        "CASE_STATUS_CHANGED",
                        json!({
                            "from": case.status.as_str(),
                            "to": CaseStatus::CleanupRunning.as_str(),
                        }),
                    ))
                    .await?;
            }
        }

        tracing::info!(case_id = %case_id, "cleanup started");
        let refs = self.messages.list_message_refs(case_id).await?;
        tracing::info!(case_id = %case_id, message_refs = refs.len(), "cleanup refs loaded");

        let mut success_count = 0u32;
        let mut failed_count = 0u32;

        for message_ref in &refs {
            match self.redact_with_retry(&message_ref.room_id, &message_ref.event_id).await {
                Ok(()) => {
                    success_count += 1;
                    self.audit
                        .append_event(NewAuditEvent {
                            case_id,
                            actor_type: triage_core::ActorType::System,
                            event_type: "MATRIX_EVENT_REDACTED".to_owned(),
                            payload: json!({}),
                            room_id: Some(message_ref.room_id.clone()),
                            matrix_event_id: Some(message_ref.event_id.clone()),
                        })
                        .await?;
                }
                Err(error) => {
                    failed_count += 1;
                    tracing::warn!(
                        case_id = %case_id,
                        room_id = %message_ref.room_id,
                        event_id = %message_ref.event_id,
                        error = %error,
                        "cleanup redaction failed"
                    );
                    self.audit
                        .append_event(NewAuditEvent {
                            case_id,
                            actor_type: triage_core::ActorType::System,
                            event_type: "MATRIX_EVENT_REDACTION_FAILED".to_owned(),
                            payload: json!({"error": error.to_string()}),
                            room_id: Some(message_ref.room_id.clone()),
                            matrix_event_id: Some(message_ref.event_id.clone()),
                        })
                        .await?;
                }
            }
        }

        self.cases.mark_cleanup_completed(case_id).await?;
        self.audit
            .append_event(NewAuditEvent::system(
                case_id,
                "CLEANUP_COMPLETED",
                json!({
                    "count_redacted_success": success_count,
                    "count_redacted_failed": failed_count,
                }),
            ))
            .await?;

        tracing::info!(
            case_id = %case_id,
            redacted_success = success_count,
            redacted_failed = failed_count,
            "cleanup completed"
        );
        Ok(CleanupResult { redacted_success: success_count, redacted_failed: failed_count })
    }

    /// Redact one event with rate-limit aware retries; any other failure
    /// fails fast for the caller's per-event accounting.
    async fn redact_with_retry(&self, room_id: &str, event_id: &str) -> Result<(), MatrixError> {
        for attempt in 1..=MAX_REDACTION_ATTEMPTS {
            match self.matrix.redact_event(room_id, event_id).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    let Some(retry_after_ms) = error.retry_after_ms() else {
                        return Err(error);
                    };
                    if attempt >= MAX_REDACTION_ATTEMPTS {
                        return Err(error);
                    }
                    let delay =
                        Duration::from_millis(retry_after_ms).max(MIN_RETRY_DELAY);
                    tracing::warn!(
                        room_id,
                        event_id,
                        attempt,
                        max_attempts = MAX_REDACTION_ATTEMPTS,
                        retry_after_ms,
                        "redaction rate limited"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
        unreachable!("loop returns on success or final attempt")
    }
}
