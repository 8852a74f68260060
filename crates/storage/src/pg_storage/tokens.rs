//! AuthTokenStore and AuthEventStore implementations for PgStorage.

use super::*;

use async_trait::async_trait;

use crate::traits::{AuthEventStore, AuthTokenStore};
use crate::types::NewAuthEvent;

#[async_trait]
impl AuthTokenStore for PgStorage {
    async fn insert_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO auth_tokens (user_id, token_hash, expires_at)
               VALUES ($1, $2, $3)
               RETURNING id",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<AuthTokenRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT id, user_id, expires_at, revoked_at FROM auth_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_token).transpose()
    }

    async fn touch_last_used(&self, token_id: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE auth_tokens SET last_used_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE auth_tokens SET revoked_at = CURRENT_TIMESTAMP
               WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl AuthEventStore for PgStorage {
    async fn append_auth_event(&self, event: NewAuthEvent) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO auth_events (user_id, event_type, ip_address, user_agent, payload)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id",
        )
        .bind(event.user_id)
        .bind(&event.event_type)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}
