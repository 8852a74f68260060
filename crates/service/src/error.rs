//! Typed error enum for the orchestration layer.
//!
//! Handlers never swallow errors: they either write new state or raise, and
//! the worker runtime applies retry/dead-letter policy. Pipeline stages tag
//! their failures with a cause label; the label travels inside `last_error`
//! and is recovered by substring when a job dead-letters.

use thiserror::Error;
use uuid::Uuid;

use triage_matrix::MatrixError;
use triage_storage::StorageError;

/// Failure-cause label carried by pipeline stage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCause {
    Download,
    Extract,
    RecordExtract,
    Llm1,
    Llm2,
}

impl StageCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Extract => "extract",
            Self::RecordExtract => "record_extract",
            Self::Llm1 => "llm1",
            Self::Llm2 => "llm2",
        }
    }
}

impl std::fmt::Display for StageCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestration-layer error.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("matrix: {0}")]
    Matrix(#[from] MatrixError),

    /// Pipeline stage failure; the cause label leads the message so
    /// dead-letter categorization can recover it.
    #[error("{cause}: {details}")]
    Stage { cause: StageCause, details: String },

    #[error("case not found: {0}")]
    CaseNotFound(Uuid),

    #[error("invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown job type: {0}")]
    UnknownJobType(String),
}

impl ServiceError {
    pub fn stage(cause: StageCause, details: impl Into<String>) -> Self {
        Self::Stage { cause, details: details.into() }
    }
}

/// Derive the user-facing failure cause from a dead job's last error.
pub fn categorize_failure(last_error: Option<&str>) -> &'static str {
    let Some(last_error) = last_error else {
        return "other";
    };
    let lowered = last_error.to_lowercase();
    for candidate in ["download", "extract", "record_extract", "llm1", "llm2"] {
        if lowered.contains(candidate) {
            // "record_extract" also contains "extract"; check longest first.
            if candidate == "extract" && lowered.contains("record_extract") {
                return "record_extract";
            }
            return candidate;
        }
    }
    "other"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_message_leads_with_cause() {
        let error = ServiceError::stage(StageCause::Llm1, "schema validation failed");
        assert_eq!(error.to_string(), "llm1: schema validation failed");
    }

    #[test]
    fn categorize_matches_known_causes_by_substring() {
        assert_eq!(categorize_failure(Some("download: 404 from homeserver")), "download");
        assert_eq!(categorize_failure(Some("llm2: case_id mismatch")), "llm2");
        assert_eq!(categorize_failure(Some("record_extract: no token")), "record_extract");
        assert_eq!(categorize_failure(Some("something else entirely")), "other");
        assert_eq!(categorize_failure(None), "other");
    }
}
