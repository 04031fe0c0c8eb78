use sqlx::SqlitePool;

use crate::error::StoreError;

/// Apply the embedded schema migrations from `migrations/`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Migration(e.to_string()))
}
