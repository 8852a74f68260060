//! DispatchStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;

use crate::traits::DispatchStore;

#[async_trait]
impl DispatchStore for PgStorage {
    async fn claim_window(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let insert = sqlx::query(
            "INSERT INTO supervisor_summary_dispatches
               (room_id, window_start, window_end, status)
               VALUES ($1, $2, $3, 'pending')",
        )
        .bind(room_id)
        .bind(window_start)
        .bind(window_end)
        .execute(&self.pool)
        .await;

        match insert {
            Ok(_) => Ok(true),
            Err(error) => {
                let storage_error = StorageError::from(error);
                if !storage_error.is_duplicate() {
                    return Err(storage_error);
                }
                // The window exists: only a previously failed dispatch may be
                // reclaimed, and only by one caller (CAS on status).
                let result = sqlx::query(
                    "UPDATE supervisor_summary_dispatches SET
                         status = 'pending',
                         last_error = NULL,
                         updated_at = CURRENT_TIMESTAMP
                       WHERE room_id = $1 AND window_start = $2 AND window_end = $3
                         AND status = 'failed'",
                )
                .bind(room_id)
                .bind(window_start)
                .bind(window_end)
                .execute(&self.pool)
                .await?;
                Ok(result.rows_affected() == 1)
            }
        }
    }

    async fn mark_sent(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        matrix_event_id: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE supervisor_summary_dispatches SET
                 status = 'sent',
                 sent_at = $1,
                 matrix_event_id = $2,
                 last_error = NULL,
                 updated_at = CURRENT_TIMESTAMP
               WHERE room_id = $3 AND window_start = $4 AND window_end = $5
                 AND status = 'pending'",
        )
        .bind(sent_at)
        .bind(matrix_event_id)
        .bind(room_id)
        .bind(window_start)
        .bind(window_end)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        last_error: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE supervisor_summary_dispatches SET
                 status = 'failed',
                 last_error = $1,
                 updated_at = CURRENT_TIMESTAMP
               WHERE room_id = $2 AND window_start = $3 AND window_end = $4
                 AND status = 'pending'",
        )
        .bind(last_error)
        .bind(room_id)
        .bind(window_start)
        .bind(window_end)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_by_window(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Option<DispatchRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT id, room_id, window_start, window_end, status, sent_at, matrix_event_id,
                    last_error
               FROM supervisor_summary_dispatches
               WHERE room_id = $1 AND window_start = $2 AND window_end = $3",
        )
        .bind(room_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_dispatch).transpose()
    }
}
