//! Storage layer for the EDA triage bot.
//!
//! PostgreSQL persistence behind async domain traits: the case aggregate,
//! the durable job queue, message/audit tracking, append-only transcripts,
//! prompt templates, operator accounts, and Room-4 dispatch idempotency.

#![allow(
    unused_results,
    reason = "SQL execute() returns row count which is often unused in INSERT/UPDATE operations"
)]

pub mod error;
pub mod pg_migrations;
pub mod pg_storage;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use pg_storage::PgStorage;
pub use traits::{
    AuditStore, AuthEventStore, AuthTokenStore, CaseStore, DispatchStore, JobQueueStore,
    MessageStore, PriorCaseStore, PromptStore, TranscriptStore, UserStore,
};
pub use types::{
    AuditEventRecord, AuthTokenRecord, CaseMessageRef, CaseRecord, CaseRecoverySnapshot,
    DispatchRecord, DispatchStatus, JobRecord, JobStatus, LlmStage, NewAuditEvent, NewAuthEvent,
    NewCase, NewCaseMessage, NewJob, NewLlmInteraction, NewMatrixTranscript, NewReportTranscript,
    NewUser, PriorCaseContext, PriorCaseDecision, PriorCaseSummary, PromptTemplateRecord,
    TranscriptDirection, UserRecord, WindowSummaryCounts,
};

/// Well-known prompt template names.
pub const PROMPT_NAME_LLM1_SYSTEM: &str = "llm1_system";
pub const PROMPT_NAME_LLM1_USER: &str = "llm1_user";
pub const PROMPT_NAME_LLM2_SYSTEM: &str = "llm2_system";
pub const PROMPT_NAME_LLM2_USER: &str = "llm2_user";

/// Case message kinds tracked for cleanup redaction.
pub mod message_kind {
    pub const ROOM1_ORIGIN: &str = "room1_origin";
    pub const ROOM2_PDF: &str = "room2_pdf";
    pub const ROOM2_SUMMARY: &str = "room2_summary";
    pub const ROOM2_INSTRUCTIONS: &str = "room2_instructions";
    pub const ROOM2_TEMPLATE: &str = "room2_template";
    pub const BOT_WIDGET: &str = "bot_widget";
    pub const BOT_ACK: &str = "bot_ack";
    pub const ROOM3_REQUEST: &str = "room3_request";
    pub const ROOM3_TEMPLATE: &str = "room3_template";
    pub const ROOM3_ACK: &str = "room3_ack";
    pub const ROOM1_FINAL: &str = "room1_final";
    pub const ROOM4_SUMMARY: &str = "room4_summary";
}

/// Job type vocabulary shared by enqueuers, worker, and recovery.
pub mod job_type {
    pub const PROCESS_PDF_CASE: &str = "process_pdf_case";
    pub const POST_ROOM2_WIDGET: &str = "post_room2_widget";
    pub const POST_ROOM3_REQUEST: &str = "post_room3_request";
    pub const POST_ROOM1_FINAL_DENIAL_TRIAGE: &str = "post_room1_final_denial_triage";
    pub const POST_ROOM1_FINAL_APPT: &str = "post_room1_final_appt";
    pub const POST_ROOM1_FINAL_APPT_DENIED: &str = "post_room1_final_appt_denied";
    pub const POST_ROOM1_FINAL_FAILURE: &str = "post_room1_final_failure";
    pub const EXECUTE_CLEANUP: &str = "execute_cleanup";
    pub const POST_ROOM4_SUMMARY: &str = "post_room4_summary";
}
