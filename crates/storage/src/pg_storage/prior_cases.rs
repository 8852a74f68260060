//! PriorCaseStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;
use chrono::Duration;

use crate::traits::PriorCaseStore;
use crate::types::{PriorCaseContext, PriorCaseDecision, PriorCaseSummary};

#[async_trait]
impl PriorCaseStore for PgStorage {
    async fn lookup_recent_context(
        &self,
        case_id: Uuid,
        agency_record_number: &str,
        now: DateTime<Utc>,
    ) -> Result<PriorCaseContext, StorageError> {
        let window_start = now - Duration::days(7);

        let row = sqlx::query(
            "SELECT case_id, status, doctor_decision, doctor_reason, doctor_decided_at,
                    appointment_status, appointment_reason, updated_at
               FROM cases
               WHERE agency_record_number = $1
                 AND case_id <> $2
                 AND updated_at >= $3
                 AND (doctor_decision IS NOT NULL OR status = 'FAILED')
               ORDER BY updated_at DESC
               LIMIT 1",
        )
        .bind(agency_record_number)
        .bind(case_id)
        .bind(window_start)
        .fetch_optional(&self.pool)
        .await?;

        let prior_case = match row {
            None => None,
            Some(row) => {
                let status: String = row.try_get("status")?;
                let doctor_decision: Option<String> = row.try_get("doctor_decision")?;
                let appointment_status: Option<String> = row.try_get("appointment_status")?;
                let decision = classify_prior_decision(
                    &status,
                    doctor_decision.as_deref(),
                    appointment_status.as_deref(),
                );
                let reason: Option<String> = match decision {
                    PriorCaseDecision::DenyAppointment => row.try_get("appointment_reason")?,
                    _ => row.try_get("doctor_reason")?,
                };
                let decided_at: Option<DateTime<Utc>> = row.try_get("doctor_decided_at")?;
                let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
                Some(PriorCaseSummary {
                    prior_case_id: row.try_get("case_id")?,
                    decided_at: decided_at.unwrap_or(updated_at),
                    decision,
                    reason,
                })
            }
        };

        let denial_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cases
               WHERE agency_record_number = $1
                 AND case_id <> $2
                 AND updated_at >= $3
                 AND (doctor_decision = 'deny' OR appointment_status = 'denied')",
        )
        .bind(agency_record_number)
        .bind(case_id)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(PriorCaseContext {
            prior_case,
            prior_denial_count_7d: Some(denial_count),
        })
    }
}

fn classify_prior_decision(
    status: &str,
    doctor_decision: Option<&str>,
    appointment_status: Option<&str>,
) -> PriorCaseDecision {
    if doctor_decision == Some("deny") {
        return PriorCaseDecision::DenyTriage;
    }
    if appointment_status == Some("denied") {
        return PriorCaseDecision::DenyAppointment;
    }
    if status == "FAILED" {
        return PriorCaseDecision::Failed;
    }
    PriorCaseDecision::Accepted
}
