//! `process_pdf_case` handler: download, extract, record-number strip, and
//! both LLM stages, ending with the Room-2 widget job enqueued.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use triage_core::{CaseStatus, extract_and_strip_record_number};
use triage_matrix::MatrixClient;
use triage_storage::{
    AuditStore, CaseStore, JobQueueStore, NewAuditEvent, NewJob, NewReportTranscript,
    PriorCaseStore, TranscriptStore, job_type,
};

use crate::error::{ServiceError, StageCause};
use crate::llm1::Llm1Service;
use crate::llm2::Llm2Service;
use crate::ports::PdfTextExtractor;

/// Orchestrates the extraction pipeline for one case.
pub struct ProcessPdfCaseService {
    cases: Arc<dyn CaseStore>,
    audit: Arc<dyn AuditStore>,
    queue: Arc<dyn JobQueueStore>,
    transcripts: Arc<dyn TranscriptStore>,
    prior_cases: Arc<dyn PriorCaseStore>,
    matrix: Arc<dyn MatrixClient>,
    pdf_extractor: Arc<dyn PdfTextExtractor>,
    llm1: Arc<Llm1Service>,
    llm2: Arc<Llm2Service>,
}

impl ProcessPdfCaseService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cases: Arc<dyn CaseStore>,
        audit: Arc<dyn AuditStore>,
        queue: Arc<dyn JobQueueStore>,
        transcripts: Arc<dyn TranscriptStore>,
        prior_cases: Arc<dyn PriorCaseStore>,
        matrix: Arc<dyn MatrixClient>,
        pdf_extractor: Arc<dyn PdfTextExtractor>,
        llm1: Arc<Llm1Service>,
        llm2: Arc<Llm2Service>,
    ) -> Self {
        Self { cases, audit, queue, transcripts, prior_cases, matrix, pdf_extractor, llm1, llm2 }
    }

    pub async fn run(&self, case_id: Uuid, pdf_mxc_url: &str) -> Result<(), ServiceError> {
        let Some(case) = self.cases.get_case(case_id).await? else {
            return Err(ServiceError::CaseNotFound(case_id));
        };

        // Retried jobs re-enter after a partial run; re-processing from the
        // top is safe because every step is idempotent per case.
        if !matches!(
            case.status,
            CaseStatus::New | CaseStatus::PdfExtracted | CaseStatus::LlmSuggest
        ) {
            tracing::info!(case_id = %case_id, status = %case.status, "pipeline already past extraction, skipping");
            return Ok(());
        }

        let (agency_record_number, cleaned_text) = if case.status == CaseStatus::New {
            let pdf_bytes = self
                .matrix
                .download_media(pdf_mxc_url)
                .await
                .map_err(|e| ServiceError::stage(StageCause::Download, e.to_string()))?;

            let raw_text = self.pdf_extractor.extract_text(&pdf_bytes).await?;
            if raw_text.trim().is_empty() {
                return Err(ServiceError::stage(StageCause::Extract, "empty report text"));
            }

            let extraction = extract_and_strip_record_number(&raw_text);
            if extraction.cleaned_text.is_empty() {
                return Err(ServiceError::stage(
                    StageCause::RecordExtract,
                    "cleaned text is empty after watermark stripping",
                ));
            }

            self.cases
                .store_pdf_extraction(
                    case_id,
                    pdf_mxc_url,
                    &extraction.cleaned_text,
                    &extraction.record_number,
                )
                .await?;
            self.transcripts
                .append_report_transcript(NewReportTranscript {
                    case_id,
                    pdf_source_ref: pdf_mxc_url.to_owned(),
                    raw_text,
                    cleaned_text: extraction.cleaned_text.clone(),
                    agency_record_number: Some(extraction.record_number.clone()),
                })
                .await?;
            self.transition_with_audit(case_id, CaseStatus::New, CaseStatus::PdfExtracted).await?;

            (extraction.record_number, extraction.cleaned_text)
        } else {
            // Crash-recovered run: reuse the persisted extraction.
            let record_number = case.agency_record_number.clone().ok_or_else(|| {
                ServiceError::stage(StageCause::RecordExtract, "missing persisted record number")
            })?;
            let cleaned_text = case.extracted_text.clone().ok_or_else(|| {
                ServiceError::stage(StageCause::Extract, "missing persisted extracted text")
            })?;
            (record_number, cleaned_text)
        };

        let llm1_result =
            self.llm1.run(case_id, &agency_record_number, &cleaned_text).await?;
        self.cases
            .store_llm1_artifacts(case_id, &llm1_result.structured_data, &llm1_result.summary_text)
            .await?;
        if case.status != CaseStatus::LlmSuggest {
            self.transition_with_audit(case_id, CaseStatus::PdfExtracted, CaseStatus::LlmSuggest)
                .await?;
        }

        let prior_context = self
            .prior_cases
            .lookup_recent_context(case_id, &agency_record_number, chrono::Utc::now())
            .await?;
        let prior_case_json = prior_context
            .prior_case
            .as_ref()
            .map(|prior| {
                serde_json::to_value(prior)
                    .map_err(|e| ServiceError::stage(StageCause::Llm2, e.to_string()))
            })
            .transpose()?;

        let llm2_result = self
            .llm2
            .run(
                case_id,
                &agency_record_number,
                &llm1_result.structured_data,
                prior_case_json.as_ref(),
            )
            .await?;
        self.cases.store_llm2_artifacts(case_id, &llm2_result.suggested_action).await?;
        if !llm2_result.contradictions.is_empty() {
            self.audit
                .append_event(NewAuditEvent::system(
                    case_id,
                    "POLICY_CONTRADICTIONS_RECORDED",
                    json!({"contradictions": llm2_result.contradictions}),
                ))
                .await?;
        }

        self.transition_with_audit(case_id, CaseStatus::LlmSuggest, CaseStatus::R2PostWidget)
            .await?;

        if !self.queue.has_active_job(case_id, job_type::POST_ROOM2_WIDGET).await? {
            self.queue
                .enqueue(NewJob::now(job_type::POST_ROOM2_WIDGET, Some(case_id), json!({})))
                .await?;
        }

        tracing::info!(case_id = %case_id, "pdf pipeline completed, widget job enqueued");
        Ok(())
    }

    async fn transition_with_audit(
        &self,
        case_id: Uuid,
        from: CaseStatus,
        to: CaseStatus,
    ) -> Result<(), ServiceError> {
        from.transition_to(to)
            .map_err(|e| ServiceError::InvalidPayload(e.to_string()))?;
        let moved = self.cases.transition_status(case_id, from, to).await?;
        if moved {
            self.audit
                .append_event(NewAuditEvent::system(
                    case_id,
                    "CASE_STATUS_CHANGED",
                    json!({"from": from.as_str(), "to": to.as_str()}),
                ))
                .await?;
        }
        Ok(())
    }
}
