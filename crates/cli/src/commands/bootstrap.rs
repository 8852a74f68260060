//! Bootstrap commands: first admin account and prompt seeding.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::config::Settings;
use crate::context::build_context;

pub async fn run(settings: &Settings) -> Result<()> {
    let Some((email, password)) = settings.bootstrap_admin_credentials()? else {
        bail!("BOOTSTRAP_ADMIN_EMAIL and a password source must be configured");
    };

    let context = build_context(settings).await?;
    match context.auth_service.bootstrap_admin(&email, &password).await? {
        Some(user) => tracing::info!(email = %user.email, "bootstrap admin created"),
        None => tracing::info!("active admin already present, nothing to do"),
    }
    Ok(())
}

pub async fn seed_prompt(settings: &Settings, name: &str, file: &Path) -> Result<()> {
    const KNOWN_NAMES: [&str; 4] = ["llm1_system", "llm1_user", "llm2_system", "llm2_user"];
    if !KNOWN_NAMES.contains(&name) {
        bail!("unknown prompt name: {name} (expected one of {KNOWN_NAMES:?})");
    }

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading prompt file {}", file.display()))?;
    if content.trim().is_empty() {
        bail!("prompt content file is empty");
    }

    let context = build_context(settings).await?;
    let created = context.prompt_management.seed_version(name, &content).await?;

    // Seeded versions activate immediately so the pipeline can run.
    let activated = context
        .prompt_management
        .activate_version(name, created.version, None)
        .await?;
    match activated {
        Ok(record) => {
            tracing::info!(name = %record.name, version = record.version, "prompt seeded and activated");
        }
        Err(missing) => bail!("activation failed: {missing}"),
    }
    Ok(())
}
