//! UserStore implementation for PgStorage.

use super::*;

use async_trait::async_trait;

use crate::traits::UserStore;
use crate::types::NewUser;

const USER_COLUMNS: &str =
    "id, email, password_hash, role, account_status, is_active, created_at, updated_at";

#[async_trait]
impl UserStore for PgStorage {
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY email"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StorageError> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, email, password_hash, role, account_status)
               VALUES ($1, LOWER($2), $3, $4, $5)
               RETURNING {USER_COLUMNS}"
        ))
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.account_status.as_str())
        .fetch_one(&self.pool)
        .await?;
        row_to_user(&row)
    }

    async fn set_account_status(
        &self,
        user_id: Uuid,
        account_status: AccountStatus,
    ) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET
                 account_status = $1,
                 is_active = ($1 = 'active'),
                 updated_at = CURRENT_TIMESTAMP
               WHERE id = $2
               RETURNING {USER_COLUMNS}"
        ))
        .bind(account_status.as_str())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn any_active_admin(&self) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM users WHERE role = 'admin' AND account_status = 'active'
             )",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
