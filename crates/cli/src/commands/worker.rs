//! Worker command: boot recovery then the polling runtime.

use anyhow::Result;
use tokio::sync::watch;

use crate::config::Settings;
use crate::context::build_context;

pub async fn run(settings: &Settings) -> Result<()> {
    let context = build_context(settings).await?;

    let recovery = context.recovery.recover().await?;
    tracing::info!(
        reset_running_jobs = recovery.reset_running_jobs,
        scanned_cases = recovery.scanned_cases,
        enqueued_jobs = recovery.enqueued_jobs,
        "boot recovery finished"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("stop signal received");
            let _ = stop_tx.send(true);
        }
    });

    context.worker_runtime.run_until_stopped(stop_rx).await?;
    Ok(())
}
