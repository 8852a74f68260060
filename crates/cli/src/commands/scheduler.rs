//! One-shot Room-4 summary scheduler command.

use anyhow::Result;

use crate::config::Settings;
use crate::context::build_context;

pub async fn run_once(settings: &Settings) -> Result<()> {
    let context = build_context(settings).await?;

    let result = context.scheduler.enqueue_previous_window_summary(None).await?;
    tracing::info!(
        claimed_dispatch = result.claimed_dispatch,
        enqueued_job_id = ?result.enqueued_job_id,
        room4_id = %settings.room4_id,
        window_start_utc = %result.window.window_start_utc,
        window_end_utc = %result.window.window_end_utc,
        "scheduler pass finished"
    );
    Ok(())
}
