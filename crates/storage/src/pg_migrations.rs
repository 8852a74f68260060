//! PostgreSQL schema migrations for triage storage.

use sqlx::PgPool;

use crate::error::StorageError;

/// Run all PostgreSQL migrations.
pub async fn run_pg_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    tracing::info!("PostgreSQL migrations completed");
    Ok(())
}
