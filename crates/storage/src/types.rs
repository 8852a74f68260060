//! Persistence records shared across storage traits and their callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use triage_core::{
    AccountStatus, ActorType, AppointmentStatus, CaseStatus, DoctorDecision, Role, SupportFlag,
};

/// Input payload for creating a case row.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub case_id: Uuid,
    pub status: CaseStatus,
    pub room1_origin_room_id: String,
    pub room1_origin_event_id: String,
    pub room1_sender_user_id: String,
}

/// Full case row.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub case_id: Uuid,
    pub status: CaseStatus,
    pub room1_origin_room_id: String,
    pub room1_origin_event_id: String,
    pub room1_sender_user_id: String,
    pub agency_record_number: Option<String>,
    pub pdf_source_ref: Option<String>,
    pub extracted_text: Option<String>,
    pub structured_data: Option<Value>,
    pub summary_text: Option<String>,
    pub suggested_action: Option<Value>,
    pub doctor_decision: Option<DoctorDecision>,
    pub doctor_support_flag: Option<SupportFlag>,
    pub doctor_reason: Option<String>,
    pub doctor_decided_at: Option<DateTime<Utc>>,
    pub appointment_status: Option<AppointmentStatus>,
    pub appointment_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub instructions: Option<String>,
    pub appointment_reason: Option<String>,
    pub cleanup_triggered_at: Option<DateTime<Utc>>,
    pub cleanup_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Slim snapshot used by the boot-time recovery scan.
#[derive(Debug, Clone)]
pub struct CaseRecoverySnapshot {
    pub case_id: Uuid,
    pub status: CaseStatus,
    pub cleanup_triggered_at: Option<DateTime<Utc>>,
    pub cleanup_completed_at: Option<DateTime<Utc>>,
}

/// Per-outcome counts for one Room-4 reporting window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WindowSummaryCounts {
    pub cases_created: i64,
    pub doctor_accepted: i64,
    pub doctor_denied: i64,
    pub appt_confirmed: i64,
    pub appt_denied: i64,
    pub failed: i64,
    pub cleaned: i64,
}

/// Input payload for inserting a job into the queue.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub case_id: Option<Uuid>,
    pub payload: Value,
    pub run_after: Option<DateTime<Utc>>,
    pub max_attempts: i32,
}

impl NewJob {
    /// Job with default scheduling (due now, five attempts).
    pub fn now(job_type: impl Into<String>, case_id: Option<Uuid>, payload: Value) -> Self {
        Self { job_type: job_type.into(), case_id, payload, run_after: None, max_attempts: 5 }
    }
}

/// Job queue status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
    Dead,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Dead => "dead",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "dead" => Ok(Self::Dead),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Persisted queue record consumed by the worker runtime.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: i64,
    pub case_id: Option<Uuid>,
    pub job_type: String,
    pub status: JobStatus,
    pub run_after: DateTime<Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input payload for a case message mapping.
#[derive(Debug, Clone)]
pub struct NewCaseMessage {
    pub case_id: Uuid,
    pub room_id: String,
    pub event_id: String,
    pub kind: String,
    pub sender_user_id: Option<String>,
}

/// Room/event pair targeted by cleanup redaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseMessageRef {
    pub room_id: String,
    pub event_id: String,
    pub kind: String,
}

/// Input payload for a case audit event.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub case_id: Uuid,
    pub actor_type: ActorType,
    pub event_type: String,
    pub payload: Value,
    pub room_id: Option<String>,
    pub matrix_event_id: Option<String>,
}

impl NewAuditEvent {
    pub fn system(case_id: Uuid, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            case_id,
            actor_type: ActorType::System,
            event_type: event_type.into(),
            payload,
            room_id: None,
            matrix_event_id: None,
        }
    }
}

/// Persisted audit event row.
#[derive(Debug, Clone)]
pub struct AuditEventRecord {
    pub id: i64,
    pub case_id: Uuid,
    pub actor_type: ActorType,
    pub event_type: String,
    pub payload: Value,
    pub room_id: Option<String>,
    pub matrix_event_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// LLM pipeline stage tag for interaction transcripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmStage {
    Llm1,
    Llm2,
}

impl LlmStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm1 => "LLM1",
            Self::Llm2 => "LLM2",
        }
    }
}

/// Input payload for one append-only LLM interaction transcript.
#[derive(Debug, Clone)]
pub struct NewLlmInteraction {
    pub case_id: Uuid,
    pub stage: LlmStage,
    pub input_payload: Value,
    pub output_payload: Value,
    pub prompt_system_name: String,
    pub prompt_system_version: i32,
    pub prompt_user_name: String,
    pub prompt_user_version: i32,
    pub model_name: String,
}

/// Input payload for one append-only report transcript.
#[derive(Debug, Clone)]
pub struct NewReportTranscript {
    pub case_id: Uuid,
    pub pdf_source_ref: String,
    pub raw_text: String,
    pub cleaned_text: String,
    pub agency_record_number: Option<String>,
}

/// Direction of a transcribed Matrix message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptDirection {
    Inbound,
    Outbound,
}

impl TranscriptDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Input payload for one append-only Matrix message transcript.
#[derive(Debug, Clone)]
pub struct NewMatrixTranscript {
    pub case_id: Uuid,
    pub room_id: String,
    pub event_id: String,
    pub direction: TranscriptDirection,
    pub sender_user_id: Option<String>,
    pub body: String,
}

/// Prompt version row with immutable content.
#[derive(Debug, Clone, Serialize)]
pub struct PromptTemplateRecord {
    pub name: String,
    pub version: i32,
    pub content: String,
    pub is_active: bool,
}

/// User account row.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub account_status: AccountStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input payload for creating a user account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub account_status: AccountStatus,
}

/// Auth token row resolved by hash lookup.
#[derive(Debug, Clone)]
pub struct AuthTokenRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Input payload for an append-only auth event.
#[derive(Debug, Clone)]
pub struct NewAuthEvent {
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub payload: Value,
}

/// Room-4 dispatch lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Pending,
    Sent,
    Failed,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DispatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown dispatch status: {other}")),
        }
    }
}

/// Persisted Room-4 summary dispatch row.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub dispatch_id: i64,
    pub room_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: DispatchStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub matrix_event_id: Option<String>,
    pub last_error: Option<String>,
}

/// Classification of the most recent prior case for widget enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorCaseDecision {
    DenyTriage,
    DenyAppointment,
    Failed,
    Accepted,
}

impl PriorCaseDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DenyTriage => "deny_triage",
            Self::DenyAppointment => "deny_appointment",
            Self::Failed => "failed",
            Self::Accepted => "accepted",
        }
    }
}

/// Prior-case block embedded into the Room-2 widget payload.
#[derive(Debug, Clone, Serialize)]
pub struct PriorCaseSummary {
    pub prior_case_id: Uuid,
    pub decided_at: DateTime<Utc>,
    pub decision: PriorCaseDecision,
    pub reason: Option<String>,
}

/// Resolved prior-case enrichment for the widget payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriorCaseContext {
    pub prior_case: Option<PriorCaseSummary>,
    pub prior_denial_count_7d: Option<i64>,
}
