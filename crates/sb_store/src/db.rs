//! Database abstraction over SQLite via sqlx.

use std::path::Path;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{info, warn};

use crate::{error::StoreError, migrations};

/// Open (or create) the SQLite database at `db_path`.
/// Runs all pending migrations automatically.
///
/// Exactly one connection per process: the store is single-writer, and a
/// rotation transaction holding that connection keeps every other query out
/// until it commits or rolls back.
///
/// WAL journal mode and `synchronous = FULL` are configured at connection time
/// here, NOT inside a migration, because SQLite forbids changing
/// `journal_mode` inside a transaction and sqlx wraps every migration in one.
pub async fn open_pool(db_path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Storage(sqlx::Error::Io(e)))?;
            restrict_dir_permissions(parent);
        }
    }

    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;

    migrations::run_migrations(&pool).await?;
    info!(path = %db_path.display(), "[db] store opened");
    Ok(pool)
}

fn restrict_dir_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)) {
            warn!("cannot restrict permissions on {}: {}", path.display(), e);
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
