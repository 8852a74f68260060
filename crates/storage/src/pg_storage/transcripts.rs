//! TranscriptStore implementation for PgStorage.
//!
//! Only INSERT statements appear here; the append-only triggers installed by
//! the migrations reject anything else at the DBMS level.

use super::*;

use async_trait::async_trait;

use crate::traits::TranscriptStore;
use crate::types::{NewLlmInteraction, NewMatrixTranscript, NewReportTranscript};

#[async_trait]
impl TranscriptStore for PgStorage {
    async fn append_report_transcript(
        &self,
        transcript: NewReportTranscript,
    ) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO case_report_transcripts
               (case_id, pdf_source_ref, raw_text, cleaned_text, agency_record_number)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id",
        )
        .bind(transcript.case_id)
        .bind(&transcript.pdf_source_ref)
        .bind(&transcript.raw_text)
        .bind(&transcript.cleaned_text)
        .bind(&transcript.agency_record_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn append_llm_interaction(
        &self,
        interaction: NewLlmInteraction,
    ) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO case_llm_interactions
               (case_id, stage, input_payload, output_payload, prompt_system_name,
                prompt_system_version, prompt_user_name, prompt_user_version, model_name)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id",
        )
        .bind(interaction.case_id)
        .bind(interaction.stage.as_str())
        .bind(&interaction.input_payload)
        .bind(&interaction.output_payload)
        .bind(&interaction.prompt_system_name)
        .bind(interaction.prompt_system_version)
        .bind(&interaction.prompt_user_name)
        .bind(interaction.prompt_user_version)
        .bind(&interaction.model_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn append_matrix_transcript(
        &self,
        transcript: NewMatrixTranscript,
    ) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO case_matrix_message_transcripts
               (case_id, room_id, event_id, direction, sender_user_id, body)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id",
        )
        .bind(transcript.case_id)
        .bind(&transcript.room_id)
        .bind(&transcript.event_id)
        .bind(transcript.direction.as_str())
        .bind(&transcript.sender_user_id)
        .bind(&transcript.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}
