//! PostgreSQL storage backend using sqlx.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use triage_core::{AccountStatus, ActorType, CaseStatus, Role};

use crate::error::{FieldParseError, StorageError};
use crate::pg_migrations::run_pg_migrations;
use crate::types::{
    AuditEventRecord, AuthTokenRecord, CaseRecord, DispatchRecord, DispatchStatus, JobRecord,
    JobStatus, PromptTemplateRecord, UserRecord,
};

mod audit;
mod cases;
mod dispatches;
mod jobs;
mod messages;
mod prior_cases;
mod prompts;
mod tokens;
mod transcripts;
mod users;

/// PostgreSQL-backed implementation of every storage trait.
#[derive(Clone, Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect, run migrations, and return the storage handle.
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new().max_connections(8).connect(database_url).await?;
        run_pg_migrations(&pool).await?;
        tracing::info!("PgStorage initialized");
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests / shared pools).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_field<T>(raw: &str, context: &'static str) -> Result<T, StorageError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| StorageError::corrupt(context, FieldParseError(e.to_string())))
}

fn parse_optional_field<T>(
    raw: Option<String>,
    context: &'static str,
) -> Result<Option<T>, StorageError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| parse_field(&value, context)).transpose()
}

fn row_to_case(row: &PgRow) -> Result<CaseRecord, StorageError> {
    let status_raw: String = row.try_get("status")?;
    let status: CaseStatus = parse_field(&status_raw, "cases.status")?;
    Ok(CaseRecord {
        case_id: row.try_get("case_id")?,
        status,
        room1_origin_room_id: row.try_get("room1_origin_room_id")?,
        room1_origin_event_id: row.try_get("room1_origin_event_id")?,
        room1_sender_user_id: row.try_get("room1_sender_user_id")?,
        agency_record_number: row.try_get("agency_record_number")?,
        pdf_source_ref: row.try_get("pdf_source_ref")?,
        extracted_text: row.try_get("extracted_text")?,
        structured_data: row.try_get("structured_data")?,
        summary_text: row.try_get("summary_text")?,
        suggested_action: row.try_get("suggested_action")?,
        doctor_decision: parse_optional_field(
            row.try_get("doctor_decision")?,
            "cases.doctor_decision",
        )?,
        doctor_support_flag: parse_optional_field(
            row.try_get("doctor_support_flag")?,
            "cases.doctor_support_flag",
        )?,
        doctor_reason: row.try_get("doctor_reason")?,
        doctor_decided_at: row.try_get("doctor_decided_at")?,
        appointment_status: parse_optional_field(
            row.try_get("appointment_status")?,
            "cases.appointment_status",
        )?,
        appointment_at: row.try_get("appointment_at")?,
        location: row.try_get("location")?,
        instructions: row.try_get("instructions")?,
        appointment_reason: row.try_get("appointment_reason")?,
        cleanup_triggered_at: row.try_get("cleanup_triggered_at")?,
        cleanup_completed_at: row.try_get("cleanup_completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_job(row: &PgRow) -> Result<JobRecord, StorageError> {
    let status_raw: String = row.try_get("status")?;
    let status: JobStatus = parse_field(&status_raw, "jobs.status")?;
    Ok(JobRecord {
        job_id: row.try_get("job_id")?,
        case_id: row.try_get("case_id")?,
        job_type: row.try_get("job_type")?,
        status,
        run_after: row.try_get("run_after")?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        last_error: row.try_get("last_error")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_audit_event(row: &PgRow) -> Result<AuditEventRecord, StorageError> {
    let actor_raw: String = row.try_get("actor_type")?;
    let actor_type = match actor_raw.as_str() {
        "system" => ActorType::System,
        "human" => ActorType::Human,
        "bot" => ActorType::Bot,
        other => {
            return Err(StorageError::corrupt(
                "case_events.actor_type",
                FieldParseError(other.to_owned()),
            ));
        }
    };
    Ok(AuditEventRecord {
        id: row.try_get("id")?,
        case_id: row.try_get("case_id")?,
        actor_type,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        room_id: row.try_get("room_id")?,
        matrix_event_id: row.try_get("matrix_event_id")?,
        occurred_at: row.try_get("occurred_at")?,
    })
}

fn row_to_prompt(row: &PgRow) -> Result<PromptTemplateRecord, StorageError> {
    Ok(PromptTemplateRecord {
        name: row.try_get("name")?,
        version: row.try_get("version")?,
        content: row.try_get("content")?,
        is_active: row.try_get("is_active")?,
    })
}

fn row_to_user(row: &PgRow) -> Result<UserRecord, StorageError> {
    let role_raw: String = row.try_get("role")?;
    let role: Role = parse_field(&role_raw, "users.role")?;
    let status_raw: String = row.try_get("account_status")?;
    let account_status: AccountStatus = parse_field(&status_raw, "users.account_status")?;
    Ok(UserRecord {
        user_id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
        account_status,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_token(row: &PgRow) -> Result<AuthTokenRecord, StorageError> {
    Ok(AuthTokenRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        expires_at: row.try_get("expires_at")?,
        revoked_at: row.try_get("revoked_at")?,
    })
}

fn row_to_dispatch(row: &PgRow) -> Result<DispatchRecord, StorageError> {
    let status_raw: String = row.try_get("status")?;
    let status: DispatchStatus = parse_field(&status_raw, "supervisor_summary_dispatches.status")?;
    Ok(DispatchRecord {
        dispatch_id: row.try_get("id")?,
        room_id: row.try_get("room_id")?,
        window_start: row.try_get("window_start")?,
        window_end: row.try_get("window_end")?,
        status,
        sent_at: row.try_get("sent_at")?,
        matrix_event_id: row.try_get("matrix_event_id")?,
        last_error: row.try_get("last_error")?,
    })
}

const CASE_COLUMNS: &str = "case_id, status, room1_origin_room_id, room1_origin_event_id,
     room1_sender_user_id, agency_record_number, pdf_source_ref, extracted_text,
     structured_data, summary_text, suggested_action, doctor_decision,
     doctor_support_flag, doctor_reason, doctor_decided_at, appointment_status,
     appointment_at, location, instructions, appointment_reason,
     cleanup_triggered_at, cleanup_completed_at, created_at, updated_at";

const JOB_COLUMNS: &str = "job_id, case_id, job_type, status, run_after, attempts,
     max_attempts, last_error, payload, created_at, updated_at";
