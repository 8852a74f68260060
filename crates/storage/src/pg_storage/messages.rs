//! MessageStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;

use crate::traits::MessageStore;
use crate::types::{CaseMessageRef, NewCaseMessage};

#[async_trait]
impl MessageStore for PgStorage {
    async fn add_message(&self, message: NewCaseMessage) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO case_messages (case_id, room_id, event_id, kind, sender_user_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id",
        )
        .bind(message.case_id)
        .bind(&message.room_id)
        .bind(&message.event_id)
        .bind(&message.kind)
        .bind(&message.sender_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn has_message_kind(
        &self,
        case_id: Uuid,
        room_id: &str,
        kind: &str,
    ) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM case_messages
                 WHERE case_id = $1 AND room_id = $2 AND kind = $3
             )",
        )
        .bind(case_id)
        .bind(room_id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_case_by_room_event_kind(
        &self,
        room_id: &str,
        event_id: &str,
        kind: &str,
    ) -> Result<Option<Uuid>, StorageError> {
        let case_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT case_id FROM case_messages
               WHERE room_id = $1 AND event_id = $2 AND kind = $3",
        )
        .bind(room_id)
        .bind(event_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(case_id)
    }

    async fn list_message_refs(&self, case_id: Uuid) -> Result<Vec<CaseMessageRef>, StorageError> {
        let rows = sqlx::query(
            "SELECT room_id, event_id, kind FROM case_messages WHERE case_id = $1 ORDER BY id",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(CaseMessageRef {
                    room_id: row.try_get("room_id")?,
                    event_id: row.try_get("event_id")?,
                    kind: row.try_get("kind")?,
                })
            })
            .collect()
    }
}
