//! SecretRepository: CRUD over the `secrets` table.
//!
//! Values are encrypted at this boundary with the session cipher; plaintext is
//! never written to disk or logged. Metadata (label, type, timestamps) stays in
//! the clear so `list` and `search` never pay decryption cost, although they
//! still require an active session.

use sb_crypto::SecretCipher;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{Secret, SecretMeta, SecretRow, DEFAULT_SECRET_TYPE},
    now_secs,
    session::Session,
};

const META_COLUMNS: &str = "id, label, type, creation_time, update_time";
const ROW_COLUMNS: &str = "id, label, type, value_ciphertext, creation_time, update_time";

#[derive(Clone)]
pub struct SecretRepository {
    pool: SqlitePool,
    session: Session,
}

impl SecretRepository {
    pub fn new(pool: SqlitePool, session: Session) -> Self {
        Self { pool, session }
    }

    /// Encrypt and insert a new secret. An empty `kind` becomes "password".
    pub async fn save(&self, label: &str, plaintext: &str, kind: &str) -> Result<String, StoreError> {
        if label.is_empty() {
            return Err(StoreError::InvalidInput("label must not be empty".into()));
        }
        if plaintext.is_empty() {
            return Err(StoreError::InvalidInput("secret value must not be empty".into()));
        }
        let kind = if kind.is_empty() { DEFAULT_SECRET_TYPE } else { kind };
        let cipher = self.session.cipher().await?;
        let token = cipher.encrypt(plaintext)?;

        let id = Uuid::new_v4().to_string();
        let now = now_secs();
        sqlx::query(
            "INSERT INTO secrets (id, label, type, value_ciphertext, creation_time, update_time)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(label)
        .bind(kind)
        .bind(&token)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        debug!(id = %id, kind, "[secrets] saved");
        Ok(id)
    }

    /// Look up by label. Labels are not unique; the earliest-created record wins.
    pub async fn get(&self, label: &str) -> Result<Secret, StoreError> {
        let cipher = self.session.cipher().await?;
        let row: Option<SecretRow> = sqlx::query_as(&format!(
            "SELECT {ROW_COLUMNS} FROM secrets WHERE label = ? ORDER BY creation_time, rowid LIMIT 1"
        ))
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;
        let row = row.ok_or_else(|| StoreError::NotFound(label.to_string()))?;
        open_row(&cipher, row)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Secret, StoreError> {
        let cipher = self.session.cipher().await?;
        let row: Option<SecretRow> =
            sqlx::query_as(&format!("SELECT {ROW_COLUMNS} FROM secrets WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let row = row.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        open_row(&cipher, row)
    }

    /// Replace the value of `id`. Label, type and creation time are untouched.
    pub async fn update(&self, id: &str, plaintext: &str) -> Result<(), StoreError> {
        if plaintext.is_empty() {
            return Err(StoreError::InvalidInput("secret value must not be empty".into()));
        }
        let cipher = self.session.cipher().await?;
        let token = cipher.encrypt(plaintext)?;
        let res = sqlx::query(
            "UPDATE secrets SET value_ciphertext = ?, update_time = MAX(?, creation_time) WHERE id = ?",
        )
        .bind(&token)
        .bind(now_secs())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        debug!(id, "[secrets] updated");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _session = self.session.cipher().await?;
        let res = sqlx::query("DELETE FROM secrets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        debug!(id, "[secrets] deleted");
        Ok(())
    }

    /// Metadata for every record, sorted by label. Never decrypts.
    pub async fn list(&self) -> Result<Vec<SecretMeta>, StoreError> {
        let _session = self.session.cipher().await?;
        self.all_meta().await
    }

    /// Case-insensitive substring match on label. An empty query matches nothing.
    pub async fn search(&self, query: &str) -> Result<Vec<SecretMeta>, StoreError> {
        let _session = self.session.cipher().await?;
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let needle = query.to_lowercase();
        Ok(self
            .all_meta()
            .await?
            .into_iter()
            .filter(|meta| meta.label.to_lowercase().contains(&needle))
            .collect())
    }

    async fn all_meta(&self) -> Result<Vec<SecretMeta>, StoreError> {
        let rows = sqlx::query_as(&format!(
            "SELECT {META_COLUMNS} FROM secrets ORDER BY label COLLATE NOCASE, creation_time"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn open_row(cipher: &SecretCipher, row: SecretRow) -> Result<Secret, StoreError> {
    Ok(Secret {
        value: cipher.decrypt(&row.value_ciphertext)?,
        kind: row.kind,
    })
}

/// Every row including ciphertext, on a caller-owned connection (rotation).
pub(crate) async fn fetch_all_rows(conn: &mut SqliteConnection) -> Result<Vec<SecretRow>, StoreError> {
    let rows = sqlx::query_as(&format!("SELECT {ROW_COLUMNS} FROM secrets ORDER BY id"))
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

/// Swap the ciphertext of one record without touching its timestamps.
pub(crate) async fn replace_ciphertext(
    conn: &mut SqliteConnection,
    id: &str,
    token: &str,
) -> Result<(), StoreError> {
    let res = sqlx::query("UPDATE secrets SET value_ciphertext = ? WHERE id = ?")
        .bind(token)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() != 1 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}
