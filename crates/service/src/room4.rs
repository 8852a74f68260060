//! `post_room4_summary` handler: build and deliver the window summary.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use triage_matrix::MatrixClient;
use triage_matrix::templates::{Room4SummaryCounts, build_room4_summary_message};
use triage_storage::{CaseStore, DispatchStatus, DispatchStore};

use crate::error::ServiceError;

/// Deliver one claimed Room-4 summary dispatch.
pub struct PostRoom4SummaryService {
    cases: Arc<dyn CaseStore>,
    dispatches: Arc<dyn DispatchStore>,
    matrix: Arc<dyn MatrixClient>,
}

impl PostRoom4SummaryService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        dispatches: Arc<dyn DispatchStore>,
        matrix: Arc<dyn MatrixClient>,
    ) -> Self {
        Self { cases, dispatches, matrix }
    }

    pub async fn run(&self, payload: &Value) -> Result<(), ServiceError> {
        let room_id = required_str(payload, "room_id")?;
        let window_start = required_datetime(payload, "window_start")?;
        let window_end = required_datetime(payload, "window_end")?;
        let timezone = required_str(payload, "timezone")?;

        // Retried jobs re-enter here: a window already marked sent is done,
        // and a failed window must be reclaimed before another send.
        match self.dispatches.get_by_window(room_id, window_start, window_end).await? {
            Some(dispatch) if dispatch.status == DispatchStatus::Sent => {
                tracing::info!(room_id, %window_start, %window_end, "summary already sent, skipping");
                return Ok(());
            }
            Some(dispatch) if dispatch.status == DispatchStatus::Failed => {
                if !self.dispatches.claim_window(room_id, window_start, window_end).await? {
                    tracing::info!(room_id, %window_start, %window_end, "failed window reclaimed elsewhere, skipping");
                    return Ok(());
                }
            }
            Some(_) => {}
            None => {
                return Err(ServiceError::InvalidPayload(
                    "summary job without a claimed dispatch window".to_owned(),
                ));
            }
        }

        let counts = self.cases.window_summary_counts(window_start, window_end).await?;
        let body = build_room4_summary_message(
            window_start,
            window_end,
            timezone,
            &Room4SummaryCounts {
                cases_created: counts.cases_created,
                doctor_accepted: counts.doctor_accepted,
                doctor_denied: counts.doctor_denied,
                appt_confirmed: counts.appt_confirmed,
                appt_denied: counts.appt_denied,
                failed: counts.failed,
                cleaned: counts.cleaned,
            },
        );

        let delivery = self.matrix.send_text(room_id, &body).await;
        match delivery {
            Ok(event_id) => {
                let marked = self
                    .dispatches
                    .mark_sent(room_id, window_start, window_end, &event_id, Utc::now())
                    .await?;
                if !marked {
                    tracing::warn!(
                        room_id,
                        %window_start,
                        %window_end,
                        "summary delivered but dispatch was not pending"
                    );
                }
                tracing::info!(room_id, event_id, "Room-4 summary posted");
                Ok(())
            }
            Err(error) => {
                // Record the failure so a later scheduler pass can reclaim
                // the window, then surface the error for queue retry.
                self.dispatches
                    .mark_failed(room_id, window_start, window_end, &error.to_string())
                    .await?;
                Err(error.into())
            }
        }
    }
}

fn required_str<'a>(payload: &'a Value, key: &str) -> Result<&'a str, ServiceError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::InvalidPayload(format!("missing {key}")))
}

fn required_datetime(payload: &Value, key: &str) -> Result<DateTime<Utc>, ServiceError> {
    let raw = required_str(payload, key)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| ServiceError::InvalidPayload(format!("invalid {key}: {e}")))
}
