//! Async domain traits for storage operations.
//!
//! Services receive these as trait objects so tests can substitute in-memory
//! fakes; `PgStorage` implements all of them against PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use triage_core::CaseStatus;

use crate::error::StorageError;
use crate::types::{
    AuditEventRecord, AuthTokenRecord, CaseMessageRef, CaseRecord, CaseRecoverySnapshot,
    DispatchRecord, JobRecord, NewAuditEvent, NewAuthEvent, NewCase, NewCaseMessage, NewJob,
    NewLlmInteraction, NewMatrixTranscript, NewReportTranscript, NewUser, PriorCaseContext,
    PromptTemplateRecord, UserRecord, WindowSummaryCounts,
};

/// Case aggregate persistence.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Create a case row; duplicate origin event yields `StorageError::Duplicate`.
    async fn create_case(&self, case: NewCase) -> Result<CaseRecord, StorageError>;

    /// Load one case by id.
    async fn get_case(&self, case_id: Uuid) -> Result<Option<CaseRecord>, StorageError>;

    /// Load one case by its Room-1 origin event.
    async fn get_case_by_origin_event(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<Option<CaseRecord>, StorageError>;

    /// Unconditionally set case status (failure finalization path).
    async fn update_status(&self, case_id: Uuid, status: CaseStatus) -> Result<(), StorageError>;

    /// Compare-and-set status transition; returns whether the row changed.
    async fn transition_status(
        &self,
        case_id: Uuid,
        from: CaseStatus,
        to: CaseStatus,
    ) -> Result<bool, StorageError>;

    /// Persist PDF source, extracted/cleaned text, and record extraction.
    async fn store_pdf_extraction(
        &self,
        case_id: Uuid,
        pdf_source_ref: &str,
        extracted_text: &str,
        agency_record_number: &str,
    ) -> Result<(), StorageError>;

    /// Persist validated LLM1 structured payload and summary text.
    async fn store_llm1_artifacts(
        &self,
        case_id: Uuid,
        structured_data: &serde_json::Value,
        summary_text: &str,
    ) -> Result<(), StorageError>;

    /// Persist validated and policy-reconciled LLM2 suggestion payload.
    async fn store_llm2_artifacts(
        &self,
        case_id: Uuid,
        suggested_action: &serde_json::Value,
    ) -> Result<(), StorageError>;

    /// Record the doctor decision while the case is still WAIT_DOCTOR.
    ///
    /// CAS on status: returns `false` when the case already left WAIT_DOCTOR.
    #[allow(clippy::too_many_arguments)]
    async fn apply_doctor_decision(
        &self,
        case_id: Uuid,
        decision: triage_core::DoctorDecision,
        support_flag: triage_core::SupportFlag,
        reason: Option<&str>,
        decided_at: DateTime<Utc>,
        new_status: CaseStatus,
    ) -> Result<bool, StorageError>;

    /// Record the scheduler outcome while the case is still WAIT_SCHEDULER.
    #[allow(clippy::too_many_arguments)]
    async fn apply_scheduler_outcome(
        &self,
        case_id: Uuid,
        appointment_status: triage_core::AppointmentStatus,
        appointment_at: Option<DateTime<Utc>>,
        location: Option<&str>,
        instructions: Option<&str>,
        reason: Option<&str>,
        new_status: CaseStatus,
    ) -> Result<bool, StorageError>;

    /// Stamp `cleanup_triggered_at` if not already set.
    async fn mark_cleanup_triggered(&self, case_id: Uuid) -> Result<(), StorageError>;

    /// Stamp `cleanup_completed_at` and move the case to CLEANED.
    async fn mark_cleanup_completed(&self, case_id: Uuid) -> Result<(), StorageError>;

    /// All non-terminal cases, for the boot recovery scan.
    async fn list_non_terminal_cases(&self) -> Result<Vec<CaseRecoverySnapshot>, StorageError>;

    /// Per-outcome case counts for a Room-4 reporting window.
    async fn window_summary_counts(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<WindowSummaryCounts, StorageError>;
}

/// Durable job queue operations.
#[async_trait]
pub trait JobQueueStore: Send + Sync {
    /// Create a queued job.
    async fn enqueue(&self, job: NewJob) -> Result<JobRecord, StorageError>;

    /// Atomically claim due queued jobs and mark them running.
    ///
    /// Concurrent callers receive disjoint sets (`FOR UPDATE SKIP LOCKED`).
    async fn claim_due(&self, limit: i64) -> Result<Vec<JobRecord>, StorageError>;

    /// Mark a job done.
    async fn mark_done(&self, job_id: i64) -> Result<(), StorageError>;

    /// Mark a job failed and persist the latest error.
    async fn mark_failed(&self, job_id: i64, last_error: &str) -> Result<(), StorageError>;

    /// Increment attempts and requeue with a future `run_after`.
    async fn schedule_retry(
        &self,
        job_id: i64,
        run_after: DateTime<Utc>,
        last_error: &str,
    ) -> Result<JobRecord, StorageError>;

    /// Mark a job dead after retries are exhausted.
    async fn mark_dead(&self, job_id: i64, last_error: &str) -> Result<JobRecord, StorageError>;

    /// Whether a queued/running job exists for the case and type.
    async fn has_active_job(&self, case_id: Uuid, job_type: &str) -> Result<bool, StorageError>;

    /// Reset orphaned running jobs back to queued; returns count reset.
    async fn reset_running_jobs(&self) -> Result<u64, StorageError>;
}

/// Case message tracking used by cleanup/redaction.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert a case message mapping; duplicate room/event/kind yields
    /// `StorageError::Duplicate`.
    async fn add_message(&self, message: NewCaseMessage) -> Result<i64, StorageError>;

    /// Whether a mapping exists for case/room/kind.
    async fn has_message_kind(
        &self,
        case_id: Uuid,
        room_id: &str,
        kind: &str,
    ) -> Result<bool, StorageError>;

    /// Resolve the case for a known room/event/kind mapping.
    async fn find_case_by_room_event_kind(
        &self,
        room_id: &str,
        event_id: &str,
        kind: &str,
    ) -> Result<Option<Uuid>, StorageError>;

    /// All tracked room/event pairs for a case, in insertion order.
    async fn list_message_refs(&self, case_id: Uuid) -> Result<Vec<CaseMessageRef>, StorageError>;
}

/// Append-only case audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an audit event and return its id.
    async fn append_event(&self, event: NewAuditEvent) -> Result<i64, StorageError>;

    /// Chronological audit trail for one case.
    async fn list_events_for_case(
        &self,
        case_id: Uuid,
    ) -> Result<Vec<AuditEventRecord>, StorageError>;
}

/// Append-only transcript tables.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn append_report_transcript(
        &self,
        transcript: NewReportTranscript,
    ) -> Result<i64, StorageError>;

    async fn append_llm_interaction(
        &self,
        interaction: NewLlmInteraction,
    ) -> Result<i64, StorageError>;

    async fn append_matrix_transcript(
        &self,
        transcript: NewMatrixTranscript,
    ) -> Result<i64, StorageError>;
}

/// Prompt template catalog with single-active-version semantics.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Active version for a prompt name, when one exists.
    async fn get_active_prompt(
        &self,
        name: &str,
    ) -> Result<Option<PromptTemplateRecord>, StorageError>;

    /// One specific version with content.
    async fn get_prompt_version(
        &self,
        name: &str,
        version: i32,
    ) -> Result<Option<PromptTemplateRecord>, StorageError>;

    /// All persisted versions with active markers, ordered by (name, version).
    async fn list_prompt_versions(&self) -> Result<Vec<PromptTemplateRecord>, StorageError>;

    /// Activate one version, deactivating the current one in the same
    /// transaction. Returns `None` when the version does not exist.
    async fn activate_prompt_version(
        &self,
        name: &str,
        version: i32,
        updated_by_user_id: Option<Uuid>,
    ) -> Result<Option<PromptTemplateRecord>, StorageError>;

    /// Append a new immutable version (next version number for the name).
    async fn create_prompt_version(
        &self,
        name: &str,
        content: &str,
        updated_by_user_id: Option<Uuid>,
    ) -> Result<PromptTemplateRecord, StorageError>;
}

/// Operator account persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StorageError>;

    /// User by normalized email, including blocked/removed accounts.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError>;

    /// All users ordered for deterministic admin listing.
    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError>;

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StorageError>;

    async fn set_account_status(
        &self,
        user_id: Uuid,
        account_status: triage_core::AccountStatus,
    ) -> Result<Option<UserRecord>, StorageError>;

    /// Whether any active admin account exists (bootstrap guard).
    async fn any_active_admin(&self) -> Result<bool, StorageError>;
}

/// Opaque auth token persistence (hashes only).
#[async_trait]
pub trait AuthTokenStore: Send + Sync {
    async fn insert_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// Token by hash regardless of expiry/revocation; callers check both.
    async fn find_token(&self, token_hash: &str)
    -> Result<Option<AuthTokenRecord>, StorageError>;

    async fn touch_last_used(&self, token_id: i64) -> Result<(), StorageError>;

    async fn revoke_token(&self, token_hash: &str) -> Result<bool, StorageError>;
}

/// Append-only authentication audit log.
#[async_trait]
pub trait AuthEventStore: Send + Sync {
    async fn append_auth_event(&self, event: NewAuthEvent) -> Result<i64, StorageError>;
}

/// Idempotent Room-4 summary dispatch tracking.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Atomically claim dispatch execution for a room/window.
    ///
    /// Fresh windows insert a pending row; a previously failed window is
    /// reclaimed via CAS failed→pending. Returns whether the caller owns it.
    async fn claim_window(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// CAS pending→sent carrying the delivered event id.
    async fn mark_sent(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        matrix_event_id: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// CAS pending→failed carrying the error.
    async fn mark_failed(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        last_error: &str,
    ) -> Result<bool, StorageError>;

    async fn get_by_window(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Option<DispatchRecord>, StorageError>;
}

/// Prior-case lookup used by Room-2 widget enrichment.
#[async_trait]
pub trait PriorCaseStore: Send + Sync {
    /// Most recent prior case sharing the record number in the last 7 days,
    /// plus the 7-day denial count.
    async fn lookup_recent_context(
        &self,
        case_id: Uuid,
        agency_record_number: &str,
        now: DateTime<Utc>,
    ) -> Result<PriorCaseContext, StorageError>;
}
