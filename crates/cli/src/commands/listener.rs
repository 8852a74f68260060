//! Matrix listener: Room-1 PDF intake and Room-2/3 reply routing.

use std::time::Duration;

use anyhow::Result;

use crate::config::Settings;
use crate::context::build_context;

pub async fn run(settings: &Settings) -> Result<()> {
    let context = build_context(settings).await?;
    let poll_interval = Duration::from_secs_f64(settings.matrix_poll_interval_seconds.max(0.1));

    // The first sync establishes the stream position; its backlog is not
    // replayed (duplicate origin events would be no-ops anyway).
    let mut since = match context.matrix.sync_once(None, 0).await {
        Ok(batch) => Some(batch.next_batch),
        Err(error) => {
            tracing::warn!(error = %error, "initial sync failed, starting without a stream token");
            None
        }
    };

    tracing::info!("matrix listener started");
    loop {
        let batch = match context
            .matrix
            .sync_once(since.as_deref(), settings.matrix_sync_timeout_ms)
            .await
        {
            Ok(batch) => batch,
            Err(error) => {
                tracing::warn!(error = %error, "sync failed, backing off");
                tokio::time::sleep(poll_interval.max(Duration::from_secs(1))).await;
                continue;
            }
        };
        since = Some(batch.next_batch.clone());

        for event in &batch.events {
            if event.room_id == settings.room1_id {
                if let Some(pdf) = event.as_pdf_origin(&settings.matrix_bot_user_id) {
                    if let Err(error) = context.intake.handle_pdf_event(&pdf).await {
                        tracing::error!(error = %error, event_id = %pdf.event_id, "intake failed");
                    }
                }
                continue;
            }

            let Some(reply_to) = event.reply_to_event_id.as_deref() else {
                continue;
            };
            let Some(reply) = event.as_reply_to(&settings.matrix_bot_user_id, reply_to) else {
                continue;
            };

            if event.room_id == settings.room2_id {
                if let Err(error) = context.room2_reply.handle_reply(&reply).await {
                    tracing::error!(error = %error, event_id = %reply.event_id, "room2 reply failed");
                }
            } else if event.room_id == settings.room3_id {
                if let Err(error) = context.room3_reply.handle_reply(&reply).await {
                    tracing::error!(error = %error, event_id = %reply.event_id, "room3 reply failed");
                }
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}
