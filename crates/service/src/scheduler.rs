//! Room-4 supervisor summary scheduler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use triage_core::{SummaryWindow, resolve_previous_summary_window};
use triage_storage::{DispatchStore, JobQueueStore, NewJob, job_type};

use crate::error::ServiceError;

/// Result summary for one scheduler execution attempt.
#[derive(Debug, Clone)]
pub struct SchedulerRunResult {
    pub claimed_dispatch: bool,
    pub enqueued_job_id: Option<i64>,
    pub window: SummaryWindow,
}

/// Compute the previous reporting window and enqueue its summary job once.
pub struct SupervisorSummaryScheduler {
    queue: Arc<dyn JobQueueStore>,
    dispatches: Arc<dyn DispatchStore>,
    room4_id: String,
    timezone_name: String,
    morning_hour: u32,
    evening_hour: u32,
}

impl SupervisorSummaryScheduler {
    pub fn new(
        queue: Arc<dyn JobQueueStore>,
        dispatches: Arc<dyn DispatchStore>,
        room4_id: String,
        timezone_name: String,
        morning_hour: u32,
        evening_hour: u32,
    ) -> Self {
        Self { queue, dispatches, room4_id, timezone_name, morning_hour, evening_hour }
    }

    /// One scheduler pass: claim the previous window, enqueue on success.
    pub async fn enqueue_previous_window_summary(
        &self,
        run_at_utc: Option<DateTime<Utc>>,
    ) -> Result<SchedulerRunResult, ServiceError> {
        let reference_now = run_at_utc.unwrap_or_else(Utc::now);
        let window = resolve_previous_summary_window(
            reference_now,
            &self.timezone_name,
            self.morning_hour,
            self.evening_hour,
        )
        .map_err(|e| ServiceError::InvalidPayload(e.to_string()))?;

        let claimed = self
            .dispatches
            .claim_window(&self.room4_id, window.window_start_utc, window.window_end_utc)
            .await?;
        if !claimed {
            tracing::info!(
                room4_id = %self.room4_id,
                window_start_utc = %window.window_start_utc,
                window_end_utc = %window.window_end_utc,
                "summary window already dispatched, skipping"
            );
            return Ok(SchedulerRunResult { claimed_dispatch: false, enqueued_job_id: None, window });
        }

        let payload = json!({
            "room_id": self.room4_id,
            "window_start": window.window_start_utc.to_rfc3339(),
            "window_end": window.window_end_utc.to_rfc3339(),
            "timezone": self.timezone_name,
        });
        let job = self
            .queue
            .enqueue(NewJob::now(job_type::POST_ROOM4_SUMMARY, None, payload))
            .await?;

        tracing::info!(
            room4_id = %self.room4_id,
            enqueued_job_id = job.job_id,
            window_start_utc = %window.window_start_utc,
            window_end_utc = %window.window_end_utc,
            "Room-4 summary job enqueued"
        );
        Ok(SchedulerRunResult {
            claimed_dispatch: true,
            enqueued_job_id: Some(job.job_id),
            window,
        })
    }
}
