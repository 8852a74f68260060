//! HTTP API server command.

use std::sync::Arc;

use anyhow::Result;

use triage_http::{AppState, create_router};

use crate::config::Settings;
use crate::context::build_context;

pub async fn run(settings: &Settings, host: &str, port: u16) -> Result<()> {
    let context = build_context(settings).await?;

    if let Some((email, password)) = settings.bootstrap_admin_credentials()? {
        context.auth_service.bootstrap_admin(&email, &password).await?;
    }

    let state = Arc::new(AppState {
        decision_service: context.decision_service.clone(),
        auth_service: context.auth_service.clone(),
        prompt_management: context.prompt_management.clone(),
        cases: context.storage.clone() as _,
        users: context.storage.clone() as _,
        webhook_hmac_secret: settings.webhook_hmac_secret.clone(),
    });
    let router = create_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "bot API listening");
    axum::serve(listener, router).await?;
    Ok(())
}
