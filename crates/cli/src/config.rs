//! Runtime settings loaded from environment variables.

use anyhow::{Context, bail};
use chrono_tz::Tz;

use triage_core::env_config::{env_parse_with_default, env_required};

/// LLM runtime selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRuntimeMode {
    Deterministic,
    Provider,
}

/// Environment-driven application settings; a plain value constructed at
/// startup and passed down.
#[derive(Debug, Clone)]
pub struct Settings {
    pub room1_id: String,
    pub room2_id: String,
    pub room3_id: String,
    pub room4_id: String,
    pub matrix_homeserver_url: String,
    pub matrix_bot_user_id: String,
    pub matrix_access_token: String,
    pub matrix_sync_timeout_ms: u64,
    pub matrix_poll_interval_seconds: f64,
    pub worker_poll_interval_seconds: f64,
    pub database_url: String,
    pub webhook_hmac_secret: String,
    pub supervisor_summary_timezone: String,
    pub supervisor_summary_morning_hour: u32,
    pub supervisor_summary_evening_hour: u32,
    pub llm_runtime_mode: LlmRuntimeMode,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model_llm1: String,
    pub openai_model_llm2: String,
    pub openai_temperature: Option<f64>,
    pub openai_timeout_seconds: f64,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
    pub bootstrap_admin_password_file: Option<String>,
    pub log_level: String,
}

impl Settings {
    /// Load and validate settings from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let settings = Self {
            room1_id: env_required("ROOM1_ID").map_err(anyhow::Error::msg)?,
            room2_id: env_required("ROOM2_ID").map_err(anyhow::Error::msg)?,
            room3_id: env_required("ROOM3_ID").map_err(anyhow::Error::msg)?,
            room4_id: env_required("ROOM4_ID").map_err(anyhow::Error::msg)?,
            matrix_homeserver_url: env_required("MATRIX_HOMESERVER_URL")
                .map_err(anyhow::Error::msg)?,
            matrix_bot_user_id: env_required("MATRIX_BOT_USER_ID").map_err(anyhow::Error::msg)?,
            matrix_access_token: env_required("MATRIX_ACCESS_TOKEN").map_err(anyhow::Error::msg)?,
            matrix_sync_timeout_ms: env_parse_with_default("MATRIX_SYNC_TIMEOUT_MS", 30_000u64),
            matrix_poll_interval_seconds: env_parse_with_default(
                "MATRIX_POLL_INTERVAL_SECONDS",
                1.0f64,
            ),
            worker_poll_interval_seconds: env_parse_with_default(
                "WORKER_POLL_INTERVAL_SECONDS",
                1.0f64,
            ),
            database_url: env_required("DATABASE_URL").map_err(anyhow::Error::msg)?,
            webhook_hmac_secret: env_required("WEBHOOK_HMAC_SECRET").map_err(anyhow::Error::msg)?,
            supervisor_summary_timezone: std::env::var("SUPERVISOR_SUMMARY_TIMEZONE")
                .unwrap_or_else(|_| "America/Bahia".to_owned()),
            supervisor_summary_morning_hour: env_parse_with_default(
                "SUPERVISOR_SUMMARY_MORNING_HOUR",
                7u32,
            ),
            supervisor_summary_evening_hour: env_parse_with_default(
                "SUPERVISOR_SUMMARY_EVENING_HOUR",
                19u32,
            ),
            llm_runtime_mode: parse_llm_runtime_mode()?,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_owned()),
            openai_model_llm1: std::env::var("OPENAI_MODEL_LLM1")
                .unwrap_or_else(|_| "gpt-4o-mini".to_owned()),
            openai_model_llm2: std::env::var("OPENAI_MODEL_LLM2")
                .unwrap_or_else(|_| "gpt-4o-mini".to_owned()),
            openai_temperature: std::env::var("OPENAI_TEMPERATURE")
                .ok()
                .and_then(|value| value.parse().ok()),
            openai_timeout_seconds: env_parse_with_default("OPENAI_TIMEOUT_SECONDS", 60.0f64),
            bootstrap_admin_email: std::env::var("BOOTSTRAP_ADMIN_EMAIL").ok(),
            bootstrap_admin_password: std::env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
            bootstrap_admin_password_file: std::env::var("BOOTSTRAP_ADMIN_PASSWORD_FILE").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
        };

        settings
            .supervisor_summary_timezone
            .parse::<Tz>()
            .map_err(|_| {
                anyhow::anyhow!("invalid timezone: {}", settings.supervisor_summary_timezone)
            })?;
        if settings.supervisor_summary_morning_hour > 23
            || settings.supervisor_summary_evening_hour > 23
        {
            bail!("summary cutoff hours must be 0..=23");
        }
        if settings.llm_runtime_mode == LlmRuntimeMode::Provider
            && settings.openai_api_key.is_none()
        {
            bail!("OPENAI_API_KEY is required when LLM_RUNTIME_MODE=provider");
        }

        Ok(settings)
    }

    /// Bootstrap admin password from env or password file, when configured.
    pub fn bootstrap_admin_credentials(&self) -> anyhow::Result<Option<(String, String)>> {
        let Some(email) = &self.bootstrap_admin_email else {
            return Ok(None);
        };
        if let Some(password) = &self.bootstrap_admin_password {
            return Ok(Some((email.clone(), password.clone())));
        }
        if let Some(path) = &self.bootstrap_admin_password_file {
            let password = std::fs::read_to_string(path)
                .with_context(|| format!("reading BOOTSTRAP_ADMIN_PASSWORD_FILE {path}"))?
                .trim()
                .to_owned();
            if password.is_empty() {
                bail!("bootstrap admin password file is empty");
            }
            return Ok(Some((email.clone(), password)));
        }
        bail!("BOOTSTRAP_ADMIN_EMAIL set without a password source")
    }
}

fn parse_llm_runtime_mode() -> anyhow::Result<LlmRuntimeMode> {
    match std::env::var("LLM_RUNTIME_MODE").as_deref() {
        Err(_) | Ok("deterministic") => Ok(LlmRuntimeMode::Deterministic),
        Ok("provider") => Ok(LlmRuntimeMode::Provider),
        Ok(other) => bail!("invalid LLM_RUNTIME_MODE: {other}"),
    }
}
