//! JobQueueStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;

use crate::traits::JobQueueStore;
use crate::types::NewJob;

#[async_trait]
impl JobQueueStore for PgStorage {
    async fn enqueue(&self, job: NewJob) -> Result<JobRecord, StorageError> {
        let row = sqlx::query(&format!(
            "INSERT INTO jobs (case_id, job_type, status, run_after, max_attempts, payload)
               VALUES ($1, $2, 'queued', COALESCE($3, CURRENT_TIMESTAMP), $4, $5)
               RETURNING {JOB_COLUMNS}"
        ))
        .bind(job.case_id)
        .bind(&job.job_type)
        .bind(job.run_after)
        .bind(job.max_attempts)
        .bind(&job.payload)
        .fetch_one(&self.pool)
        .await?;
        row_to_job(&row)
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<JobRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "UPDATE jobs
               SET status = 'running', updated_at = CURRENT_TIMESTAMP
               WHERE job_id IN (
                   SELECT job_id FROM jobs
                   WHERE status = 'queued' AND run_after <= CURRENT_TIMESTAMP
                   ORDER BY run_after, job_id
                   LIMIT $1
                   FOR UPDATE SKIP LOCKED
               )
               RETURNING {JOB_COLUMNS}"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_job).collect()
    }

    async fn mark_done(&self, job_id: i64) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE jobs SET status = 'done', updated_at = CURRENT_TIMESTAMP
               WHERE job_id = $1 AND status = 'running'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, job_id: i64, last_error: &str) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE jobs SET status = 'failed', last_error = $1, updated_at = CURRENT_TIMESTAMP
               WHERE job_id = $2 AND status NOT IN ('done', 'dead')",
        )
        .bind(last_error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn schedule_retry(
        &self,
        job_id: i64,
        run_after: DateTime<Utc>,
        last_error: &str,
    ) -> Result<JobRecord, StorageError> {
        let row = sqlx::query(&format!(
            "UPDATE jobs SET
                 status = 'queued',
                 attempts = attempts + 1,
                 run_after = $1,
                 last_error = $2,
                 updated_at = CURRENT_TIMESTAMP
               WHERE job_id = $3 AND status NOT IN ('done', 'dead')
               RETURNING {JOB_COLUMNS}"
        ))
        .bind(run_after)
        .bind(last_error)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => row_to_job(&row),
            None => Err(StorageError::NotFound { entity: "job", id: job_id.to_string() }),
        }
    }

    async fn mark_dead(&self, job_id: i64, last_error: &str) -> Result<JobRecord, StorageError> {
        let row = sqlx::query(&format!(
            "UPDATE jobs SET
                 status = 'dead',
                 attempts = attempts + 1,
                 last_error = $1,
                 updated_at = CURRENT_TIMESTAMP
               WHERE job_id = $2 AND status NOT IN ('done', 'dead')
               RETURNING {JOB_COLUMNS}"
        ))
        .bind(last_error)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => row_to_job(&row),
            None => Err(StorageError::NotFound { entity: "job", id: job_id.to_string() }),
        }
    }

    async fn has_active_job(&self, case_id: Uuid, job_type: &str) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM jobs
                 WHERE case_id = $1 AND job_type = $2 AND status IN ('queued', 'running')
             )",
        )
        .bind(case_id)
        .bind(job_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn reset_running_jobs(&self) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'queued', updated_at = CURRENT_TIMESTAMP
               WHERE status = 'running'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
