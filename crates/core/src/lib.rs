//! Core domain layer for the EDA triage bot.
//!
//! Pure types and logic with no I/O: the case state machine, deterministic
//! policy reconciliation, record-number extraction, strict reply parsers,
//! retry backoff, and reporting-window resolution.

pub mod auth;
pub mod backoff;
pub mod case;
pub mod decision;
pub mod doctor_reply;
pub mod env_config;
pub mod json_utils;
pub mod language_guard;
pub mod patient;
pub mod policy;
pub mod record_number;
pub mod scheduler_reply;
pub mod summary_window;

pub use auth::{AccountStatus, Role, UnknownRoleError};
pub use backoff::compute_retry_delay;
pub use case::{CaseStatus, StateTransitionError};
pub use decision::{ActorType, AppointmentStatus, DoctorDecision, SupportFlag};
pub use doctor_reply::{DoctorDecisionReply, DoctorReplyParseError, parse_doctor_decision_reply};
pub use json_utils::{LlmJsonParseError, decode_llm_json_object};
pub use language_guard::collect_forbidden_terms;
pub use policy::{
    PolicyAlignment, PolicyAlignmentValue, PolicyContradiction, PolicyPrecheck,
    PolicyPrecheckValue, PolicyResult, Suggestion, reconcile_eda_policy,
};
pub use record_number::{RecordNumberExtraction, extract_and_strip_record_number};
pub use scheduler_reply::{SchedulerReply, SchedulerReplyParseError, parse_scheduler_reply};
pub use summary_window::{SummaryWindow, SummaryWindowError, resolve_previous_summary_window};
