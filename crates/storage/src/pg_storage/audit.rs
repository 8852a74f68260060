//! AuditStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;

use crate::traits::AuditStore;
use crate::types::NewAuditEvent;

#[async_trait]
impl AuditStore for PgStorage {
    async fn append_event(&self, event: NewAuditEvent) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO case_events
               (case_id, actor_type, event_type, payload, room_id, matrix_event_id)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id",
        )
        .bind(event.case_id)
        .bind(event.actor_type.as_str())
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.room_id)
        .bind(&event.matrix_event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_events_for_case(
        &self,
        case_id: Uuid,
    ) -> Result<Vec<AuditEventRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, case_id, actor_type, event_type, payload, room_id, matrix_event_id,
                    occurred_at
               FROM case_events
               WHERE case_id = $1
               ORDER BY occurred_at, id",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_audit_event).collect()
    }
}
