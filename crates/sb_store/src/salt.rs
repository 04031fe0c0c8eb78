//! SaltStore: the installation salt, the "master password is configured"
//! marker, and the verifier + Argon2 cost that go with them.
//!
//! All of it lives in the single `master_state` row. Every write is one SQLite
//! statement, so a crash can never leave a half-written salt behind.

use sb_crypto::kdf::{generate_salt, SALT_LEN};
use sb_crypto::KdfParams;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::{error::StoreError, models::MasterRow, now_secs};

/// The configured master state, as read back from disk.
#[derive(Debug, Clone)]
pub struct MasterRecord {
    pub salt: Vec<u8>,
    pub verifier: Vec<u8>,
    pub params: KdfParams,
    pub updated_at: i64,
}

#[derive(Clone)]
pub struct SaltStore {
    pool: SqlitePool,
}

impl SaltStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// True iff the marker and the salt both exist.
    pub async fn is_configured(&self) -> Result<bool, StoreError> {
        let row: Option<(bool, i64)> = sqlx::query_as(
            "SELECT configured, length(salt) FROM master_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(matches!(row, Some((true, len)) if len > 0))
    }

    /// Generate a fresh salt and commit it before any key is derived from it.
    ///
    /// Fails with `AlreadyInitialized` once the marker is set. A salt left by
    /// an interrupted first-time setup (no marker) is replaced; nothing was
    /// ever encrypted under it.
    pub async fn generate_and_persist(&self) -> Result<[u8; SALT_LEN], StoreError> {
        let salt = generate_salt();
        let res = sqlx::query(
            "INSERT INTO master_state (id, salt, configured, updated_at) VALUES (1, ?, 0, ?)
             ON CONFLICT(id) DO UPDATE SET salt = excluded.salt, updated_at = excluded.updated_at
             WHERE master_state.configured = 0",
        )
        .bind(&salt[..])
        .bind(now_secs())
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::AlreadyInitialized);
        }
        debug!("[salt] new salt persisted");
        Ok(salt)
    }

    /// The persisted salt. `NotConfigured` until a master password is set.
    pub async fn load(&self) -> Result<Vec<u8>, StoreError> {
        Ok(self.load_record().await?.salt)
    }

    /// Salt, verifier and cost of the configured master password.
    pub async fn load_record(&self) -> Result<MasterRecord, StoreError> {
        let row: Option<MasterRow> = sqlx::query_as(
            "SELECT salt, configured, verifier, kdf_m_cost, kdf_t_cost, kdf_p_cost, updated_at
             FROM master_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) if row.configured && !row.salt.is_empty() => row,
            _ => return Err(StoreError::NotConfigured),
        };
        let Some(verifier) = row.verifier else {
            warn!("[salt] marker set without a verifier");
            return Err(StoreError::NotConfigured);
        };
        Ok(MasterRecord {
            params: params_from_row(row.kdf_m_cost, row.kdf_t_cost, row.kdf_p_cost)?,
            salt: row.salt,
            verifier,
            updated_at: row.updated_at,
        })
    }

    /// Record the verifier and cost for the pending salt and set the marker.
    /// Fails with `AlreadyInitialized` if another `set` won the race.
    pub async fn mark_configured(
        &self,
        salt: &[u8],
        verifier: &[u8],
        params: &KdfParams,
    ) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE master_state
             SET configured = 1, verifier = ?, kdf_m_cost = ?, kdf_t_cost = ?, kdf_p_cost = ?, updated_at = ?
             WHERE id = 1 AND configured = 0 AND salt = ?",
        )
        .bind(verifier)
        .bind(i64::from(params.memory_kib))
        .bind(i64::from(params.iterations))
        .bind(i64::from(params.parallelism))
        .bind(now_secs())
        .bind(salt)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::AlreadyInitialized);
        }
        Ok(())
    }

    /// Overwrite salt, verifier and cost inside a caller-owned transaction.
    /// Only rotation uses this; the marker must already be set.
    pub(crate) async fn replace_in(
        conn: &mut SqliteConnection,
        salt: &[u8],
        verifier: &[u8],
        params: &KdfParams,
    ) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE master_state
             SET salt = ?, verifier = ?, kdf_m_cost = ?, kdf_t_cost = ?, kdf_p_cost = ?, updated_at = ?
             WHERE id = 1 AND configured = 1",
        )
        .bind(salt)
        .bind(verifier)
        .bind(i64::from(params.memory_kib))
        .bind(i64::from(params.iterations))
        .bind(i64::from(params.parallelism))
        .bind(now_secs())
        .execute(&mut *conn)
        .await?;
        if res.rows_affected() != 1 {
            return Err(StoreError::NotConfigured);
        }
        Ok(())
    }
}

fn params_from_row(m_cost: i64, t_cost: i64, p_cost: i64) -> Result<KdfParams, StoreError> {
    let conv = |v: i64, what: &str| {
        u32::try_from(v).map_err(|_| StoreError::InvalidInput(format!("stored {what} out of range")))
    };
    Ok(KdfParams::new(
        conv(m_cost, "kdf_m_cost")?,
        conv(t_cost, "kdf_t_cost")?,
        conv(p_cost, "kdf_p_cost")?,
    ))
}
