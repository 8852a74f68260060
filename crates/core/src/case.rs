//! Case lifecycle state machine.
//!
//! Every status mutation in the system goes through
//! [`CaseStatus::allows_transition_to`] inside a storage transaction, so the
//! set of edges below is the single authority on legal case evolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persisted case status. Stored as SCREAMING_SNAKE_CASE text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    New,
    PdfExtracted,
    LlmSuggest,
    R2PostWidget,
    WaitDoctor,
    DoctorAccepted,
    DoctorDenied,
    R3PostRequest,
    WaitScheduler,
    ApptConfirmed,
    ApptDenied,
    WaitR1CleanupThumbs,
    CleanupRunning,
    Cleaned,
    Failed,
}

/// Attempted transition not permitted by the state machine.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid case transition: {from} -> {to}")]
pub struct StateTransitionError {
    pub from: CaseStatus,
    pub to: CaseStatus,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PdfExtracted => "PDF_EXTRACTED",
            Self::LlmSuggest => "LLM_SUGGEST",
            Self::R2PostWidget => "R2_POST_WIDGET",
            Self::WaitDoctor => "WAIT_DOCTOR",
            Self::DoctorAccepted => "DOCTOR_ACCEPTED",
            Self::DoctorDenied => "DOCTOR_DENIED",
            Self::R3PostRequest => "R3_POST_REQUEST",
            Self::WaitScheduler => "WAIT_SCHEDULER",
            Self::ApptConfirmed => "APPT_CONFIRMED",
            Self::ApptDenied => "APPT_DENIED",
            Self::WaitR1CleanupThumbs => "WAIT_R1_CLEANUP_THUMBS",
            Self::CleanupRunning => "CLEANUP_RUNNING",
            Self::Cleaned => "CLEANED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether the case accepts no further work.
    ///
    /// `FAILED` is terminal only until its failure reply posts; the cleanup
    /// chain re-enters it, so it is not listed here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cleaned)
    }

    /// Legal forward edges of the lifecycle.
    ///
    /// Any non-terminal status may fail; `FAILED` itself routes onward to
    /// cleanup once the Room-1 failure reply is posted.
    pub fn allows_transition_to(&self, next: CaseStatus) -> bool {
        if next == Self::Failed {
            return !self.is_terminal() && *self != Self::Failed;
        }
        match (self, next) {
            (Self::New, Self::PdfExtracted)
            | (Self::PdfExtracted, Self::LlmSuggest)
            | (Self::LlmSuggest, Self::R2PostWidget)
            | (Self::R2PostWidget, Self::WaitDoctor)
            | (Self::WaitDoctor, Self::DoctorAccepted)
            | (Self::WaitDoctor, Self::DoctorDenied)
            | (Self::DoctorAccepted, Self::R3PostRequest)
            | (Self::R3PostRequest, Self::WaitScheduler)
            | (Self::WaitScheduler, Self::ApptConfirmed)
            | (Self::WaitScheduler, Self::ApptDenied)
            | (Self::ApptConfirmed, Self::WaitR1CleanupThumbs)
            | (Self::ApptDenied, Self::WaitR1CleanupThumbs)
            | (Self::DoctorDenied, Self::WaitR1CleanupThumbs)
            | (Self::Failed, Self::WaitR1CleanupThumbs)
            | (Self::Failed, Self::CleanupRunning)
            | (Self::WaitR1CleanupThumbs, Self::CleanupRunning)
            | (Self::CleanupRunning, Self::Cleaned) => true,
            _ => false,
        }
    }

    /// Validate a transition, returning the target on success.
    pub fn transition_to(&self, next: CaseStatus) -> Result<CaseStatus, StateTransitionError> {
        if self.allows_transition_to(next) {
            Ok(next)
        } else {
            Err(StateTransitionError { from: *self, to: next })
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PDF_EXTRACTED" => Ok(Self::PdfExtracted),
            "LLM_SUGGEST" => Ok(Self::LlmSuggest),
            "R2_POST_WIDGET" => Ok(Self::R2PostWidget),
            "WAIT_DOCTOR" => Ok(Self::WaitDoctor),
            "DOCTOR_ACCEPTED" => Ok(Self::DoctorAccepted),
            "DOCTOR_DENIED" => Ok(Self::DoctorDenied),
            "R3_POST_REQUEST" => Ok(Self::R3PostRequest),
            "WAIT_SCHEDULER" => Ok(Self::WaitScheduler),
            "APPT_CONFIRMED" => Ok(Self::ApptConfirmed),
            "APPT_DENIED" => Ok(Self::ApptDenied),
            "WAIT_R1_CLEANUP_THUMBS" => Ok(Self::WaitR1CleanupThumbs),
            "CLEANUP_RUNNING" => Ok(Self::CleanupRunning),
            "CLEANED" => Ok(Self::Cleaned),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown case status: {other}")),
        }
    }
}
