//! CaseStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;

use crate::traits::CaseStore;
use crate::types::{CaseRecoverySnapshot, NewCase, WindowSummaryCounts};

#[async_trait]
impl CaseStore for PgStorage {
    async fn create_case(&self, case: NewCase) -> Result<CaseRecord, StorageError> {
        let row = sqlx::query(&format!(
            "INSERT INTO cases
               (case_id, status, room1_origin_room_id, room1_origin_event_id, room1_sender_user_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {CASE_COLUMNS}"
        ))
        .bind(case.case_id)
        .bind(case.status.as_str())
        .bind(&case.room1_origin_room_id)
        .bind(&case.room1_origin_event_id)
        .bind(&case.room1_sender_user_id)
        .fetch_one(&self.pool)
        .await?;
        row_to_case(&row)
    }

    async fn get_case(&self, case_id: Uuid) -> Result<Option<CaseRecord>, StorageError> {
        let row = sqlx::query(&format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_id = $1"))
            .bind(case_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_case).transpose()
    }

    async fn get_case_by_origin_event(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<Option<CaseRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {CASE_COLUMNS} FROM cases
               WHERE room1_origin_room_id = $1 AND room1_origin_event_id = $2"
        ))
        .bind(room_id)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_case).transpose()
    }

    async fn update_status(&self, case_id: Uuid, status: CaseStatus) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE cases SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE case_id = $2",
        )
        .bind(status.as_str())
        .bind(case_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound { entity: "case", id: case_id.to_string() });
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        case_id: Uuid,
        from: CaseStatus,
        to: CaseStatus,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE cases SET status = $1, updated_at = CURRENT_TIMESTAMP
               WHERE case_id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(case_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn store_pdf_extraction(
        &self,
        case_id: Uuid,
        pdf_source_ref: &str,
        extracted_text: &str,
        agency_record_number: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE cases SET
                 pdf_source_ref = $1,
                 extracted_text = $2,
                 agency_record_number = COALESCE(agency_record_number, $3),
                 agency_record_extracted_at = COALESCE(agency_record_extracted_at, CURRENT_TIMESTAMP),
                 updated_at = CURRENT_TIMESTAMP
               WHERE case_id = $4",
        )
        .bind(pdf_source_ref)
        .bind(extracted_text)
        .bind(agency_record_number)
        .bind(case_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_llm1_artifacts(
        &self,
        case_id: Uuid,
        structured_data: &serde_json::Value,
        summary_text: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE cases SET structured_data = $1, summary_text = $2,
                 updated_at = CURRENT_TIMESTAMP
               WHERE case_id = $3",
        )
        .bind(structured_data)
        .bind(summary_text)
        .bind(case_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_llm2_artifacts(
        &self,
        case_id: Uuid,
        suggested_action: &serde_json::Value,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE cases SET suggested_action = $1, updated_at = CURRENT_TIMESTAMP
               WHERE case_id = $2",
        )
        .bind(suggested_action)
        .bind(case_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_doctor_decision(
        &self,
        case_id: Uuid,
        decision: triage_core::DoctorDecision,
        support_flag: triage_core::SupportFlag,
        reason: Option<&str>,
        decided_at: DateTime<Utc>,
        new_status: CaseStatus,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE cases SET
                 doctor_decision = $1,
                 doctor_support_flag = $2,
                 doctor_reason = $3,
                 doctor_decided_at = $4,
                 status = $5,
                 updated_at = CURRENT_TIMESTAMP
               WHERE case_id = $6 AND status = $7",
        )
        .bind(decision.as_str())
        .bind(support_flag.as_str())
        .bind(reason)
        .bind(decided_at)
        .bind(new_status.as_str())
        .bind(case_id)
        .bind(CaseStatus::WaitDoctor.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn apply_scheduler_outcome(
        &self,
        case_id: Uuid,
        appointment_status: triage_core::AppointmentStatus,
        appointment_at: Option<DateTime<Utc>>,
        location: Option<&str>,
        instructions: Option<&str>,
        reason: Option<&str>,
        new_status: CaseStatus,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE cases SET
                 appointment_status = $1,
                 appointment_at = $2,
                 location = $3,
                 instructions = $4,
                 appointment_reason = $5,
                 status = $6,
                 updated_at = CURRENT_TIMESTAMP
               WHERE case_id = $7 AND status = $8",
        )
        .bind(appointment_status.as_str())
        .bind(appointment_at)
        .bind(location)
        .bind(instructions)
        .bind(reason)
        .bind(new_status.as_str())
        .bind(case_id)
        .bind(CaseStatus::WaitScheduler.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_cleanup_triggered(&self, case_id: Uuid) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE cases SET
                 cleanup_triggered_at = COALESCE(cleanup_triggered_at, CURRENT_TIMESTAMP),
                 updated_at = CURRENT_TIMESTAMP
               WHERE case_id = $1",
        )
        .bind(case_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_cleanup_completed(&self, case_id: Uuid) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE cases SET
                 cleanup_completed_at = CURRENT_TIMESTAMP,
                 status = $1,
                 updated_at = CURRENT_TIMESTAMP
               WHERE case_id = $2",
        )
        .bind(CaseStatus::Cleaned.as_str())
        .bind(case_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_non_terminal_cases(&self) -> Result<Vec<CaseRecoverySnapshot>, StorageError> {
        let rows = sqlx::query(
            "SELECT case_id, status, cleanup_triggered_at, cleanup_completed_at
               FROM cases
               WHERE status <> $1
               ORDER BY created_at, case_id",
        )
        .bind(CaseStatus::Cleaned.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status_raw: String = row.try_get("status")?;
                Ok(CaseRecoverySnapshot {
                    case_id: row.try_get("case_id")?,
                    status: parse_field(&status_raw, "cases.status")?,
                    cleanup_triggered_at: row.try_get("cleanup_triggered_at")?,
                    cleanup_completed_at: row.try_get("cleanup_completed_at")?,
                })
            })
            .collect()
    }

    async fn window_summary_counts(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<WindowSummaryCounts, StorageError> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2) AS cases_created,
                 COUNT(*) FILTER (WHERE doctor_decision = 'accept'
                     AND doctor_decided_at >= $1 AND doctor_decided_at < $2) AS doctor_accepted,
                 COUNT(*) FILTER (WHERE doctor_decision = 'deny'
                     AND doctor_decided_at >= $1 AND doctor_decided_at < $2) AS doctor_denied,
                 COUNT(*) FILTER (WHERE appointment_status = 'confirmed'
                     AND updated_at >= $1 AND updated_at < $2) AS appt_confirmed,
                 COUNT(*) FILTER (WHERE appointment_status = 'denied'
                     AND updated_at >= $1 AND updated_at < $2) AS appt_denied,
                 COUNT(*) FILTER (WHERE status = 'FAILED'
                     AND updated_at >= $1 AND updated_at < $2) AS failed,
                 COUNT(*) FILTER (WHERE status = 'CLEANED'
                     AND cleanup_completed_at >= $1 AND cleanup_completed_at < $2) AS cleaned
               FROM cases",
        )
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(WindowSummaryCounts {
            cases_created: row.try_get("cases_created")?,
            doctor_accepted: row.try_get("doctor_accepted")?,
            doctor_denied: row.try_get("doctor_denied")?,
            appt_confirmed: row.try_get("appt_confirmed")?,
            appt_denied: row.try_get("appt_denied")?,
            failed: row.try_get("failed")?,
            cleaned: row.try_get("cleaned")?,
        })
    }
}
