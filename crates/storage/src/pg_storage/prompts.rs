//! PromptStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;

use crate::traits::PromptStore;

const PROMPT_COLUMNS: &str = "name, version, content, is_active";

#[async_trait]
impl PromptStore for PgStorage {
    async fn get_active_prompt(
        &self,
        name: &str,
    ) -> Result<Option<PromptTemplateRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PROMPT_COLUMNS} FROM prompt_templates WHERE name = $1 AND is_active"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_prompt).transpose()
    }

    async fn get_prompt_version(
        &self,
        name: &str,
        version: i32,
    ) -> Result<Option<PromptTemplateRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PROMPT_COLUMNS} FROM prompt_templates WHERE name = $1 AND version = $2"
        ))
        .bind(name)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_prompt).transpose()
    }

    async fn list_prompt_versions(&self) -> Result<Vec<PromptTemplateRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROMPT_COLUMNS} FROM prompt_templates ORDER BY name, version"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_prompt).collect()
    }

    async fn activate_prompt_version(
        &self,
        name: &str,
        version: i32,
        updated_by_user_id: Option<Uuid>,
    ) -> Result<Option<PromptTemplateRecord>, StorageError> {
        // Deactivate-then-activate in one transaction so the partial unique
        // index never sees two active rows for the same name.
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM prompt_templates WHERE name = $1 AND version = $2)",
        )
        .bind(name)
        .bind(version)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "UPDATE prompt_templates SET is_active = FALSE, updated_at = CURRENT_TIMESTAMP
               WHERE name = $1 AND is_active",
        )
        .bind(name)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            "UPDATE prompt_templates SET
                 is_active = TRUE,
                 updated_by_user_id = $1,
                 updated_at = CURRENT_TIMESTAMP
               WHERE name = $2 AND version = $3
               RETURNING {PROMPT_COLUMNS}"
        ))
        .bind(updated_by_user_id)
        .bind(name)
        .bind(version)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row_to_prompt(&row)?))
    }

    async fn create_prompt_version(
        &self,
        name: &str,
        content: &str,
        updated_by_user_id: Option<Uuid>,
    ) -> Result<PromptTemplateRecord, StorageError> {
        let row = sqlx::query(&format!(
            "INSERT INTO prompt_templates (name, version, content, is_active, updated_by_user_id)
               SELECT $1, COALESCE(MAX(version), 0) + 1, $2, FALSE, $3
               FROM prompt_templates WHERE name = $1
               RETURNING {PROMPT_COLUMNS}"
        ))
        .bind(name)
        .bind(content)
        .bind(updated_by_user_id)
        .fetch_one(&self.pool)
        .await?;
        row_to_prompt(&row)
    }
}
