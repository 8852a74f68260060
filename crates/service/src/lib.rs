//! Orchestration layer for the EDA triage bot.
//!
//! Job handlers for the durable queue, the worker runtime with retry and
//! dead-letter policy, boot-time recovery, the Room-4 summary scheduler,
//! and the operator auth service. Every service receives its ports (stores,
//! chat adapter, LLM client, sleeper) as trait objects.

pub mod auth;
pub mod cleanup;
pub mod decision;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod job_failure;
pub mod llm1;
pub mod llm2;
pub mod pipeline;
pub mod ports;
pub mod prompts;
pub mod recovery;
pub mod room1;
pub mod room2;
pub mod room3;
pub mod room4;
pub mod scheduler;
pub mod worker;

pub use auth::{AuthFailure, AuthService, AuthenticatedUser, IssuedToken};
pub use cleanup::{CleanupResult, ExecuteCleanupService};
pub use decision::{DecisionOutcome, DecisionRequest, HandleDoctorDecisionService};
pub use error::{ServiceError, StageCause, categorize_failure};
pub use handlers::build_worker_handlers;
pub use intake::{IntakeOutcome, Room1IntakeService};
pub use job_failure::JobFailureService;
pub use llm1::Llm1Service;
pub use llm2::Llm2Service;
pub use pipeline::ProcessPdfCaseService;
pub use ports::{PdfTextExtractor, PlainTextExtractor, Sleeper, TokioSleeper};
pub use prompts::{PromptManagementService, PromptTemplateService};
pub use recovery::{RecoveryResult, RecoveryService};
pub use room1::{FinalReplyKind, Room1FinalService};
pub use room2::{PostRoom2WidgetService, Room2ReplyService};
pub use room3::{PostRoom3RequestService, Room3SchedulerReplyService};
pub use room4::PostRoom4SummaryService;
pub use scheduler::{SchedulerRunResult, SupervisorSummaryScheduler};
pub use worker::{HandlerMap, JobHandler, WorkerRuntime};

#[cfg(test)]
mod tests;
