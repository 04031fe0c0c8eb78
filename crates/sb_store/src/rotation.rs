//! Master password rotation, staged as an explicit plan.
//!
//! `RotationPlan::stage` decrypts every record under the old cipher and
//! re-encrypts it under the new one entirely in memory. Nothing touches the
//! database until `apply`, which writes the new master row and every staged
//! record inside one transaction owned by the caller. If staging fails, no
//! write was issued; if applying fails, the caller rolls the transaction back.

use sb_crypto::{KdfParams, SecretCipher};
use sqlx::SqliteConnection;

use crate::{error::StoreError, models::SecretRow, repository, salt::SaltStore};

/// The new master state written by a rotation.
pub(crate) struct PendingMaster {
    pub salt: Vec<u8>,
    pub verifier: Vec<u8>,
    pub params: KdfParams,
}

/// One re-encrypted record awaiting commit.
pub(crate) struct PendingRecord {
    pub id: String,
    pub value_ciphertext: String,
}

pub(crate) struct RotationPlan {
    master: PendingMaster,
    records: Vec<PendingRecord>,
}

impl RotationPlan {
    /// Re-encrypt every row from `old` to `new`. Fails on the first row that
    /// does not decrypt under `old`.
    pub fn stage(
        rows: &[SecretRow],
        old: &SecretCipher,
        new: &SecretCipher,
        master: PendingMaster,
    ) -> Result<Self, StoreError> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let plaintext = old
                .decrypt(&row.value_ciphertext)
                .map_err(|_| StoreError::RotationFailed(format!("record {} does not decrypt", row.id)))?;
            let value_ciphertext = new
                .encrypt(&plaintext)
                .map_err(|e| StoreError::RotationFailed(format!("re-encrypt {}: {e}", row.id)))?;
            records.push(PendingRecord {
                id: row.id.clone(),
                value_ciphertext,
            });
        }
        Ok(Self { master, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Write the staged state. Must run inside a transaction; any error leaves
    /// it to the caller to roll back.
    pub async fn apply(self, conn: &mut SqliteConnection) -> Result<usize, StoreError> {
        SaltStore::replace_in(
            conn,
            &self.master.salt,
            &self.master.verifier,
            &self.master.params,
        )
        .await?;
        for record in &self.records {
            repository::replace_ciphertext(conn, &record.id, &record.value_ciphertext).await?;
        }
        Ok(self.records.len())
    }

    #[cfg(test)]
    pub(crate) fn push_record(&mut self, record: PendingRecord) {
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::open_pool, repository::fetch_all_rows, session::Session, SecretRepository};
    use sb_crypto::MasterKey;
    use std::time::Duration;
    use tempfile::tempdir;

    fn cipher(byte: u8) -> SecretCipher {
        SecretCipher::new(MasterKey::from_bytes([byte; 32]))
    }

    fn pending_master() -> PendingMaster {
        PendingMaster {
            salt: vec![5u8; 16],
            verifier: cipher(2).verifier().to_vec(),
            params: KdfParams::new(256, 1, 1),
        }
    }

    #[test]
    fn staging_reencrypts_every_row() {
        let old = cipher(1);
        let new = cipher(2);
        let rows: Vec<SecretRow> = ["a", "b", "c"]
            .iter()
            .map(|v| SecretRow {
                id: format!("id-{v}"),
                label: v.to_string(),
                kind: "password".into(),
                value_ciphertext: old.encrypt(v).unwrap(),
                creation_time: 1,
                update_time: 1,
            })
            .collect();

        let plan = RotationPlan::stage(&rows, &old, &new, pending_master()).unwrap();
        assert_eq!(plan.len(), 3);
        for (row, staged) in rows.iter().zip(&plan.records) {
            assert_eq!(row.id, staged.id);
            assert_eq!(new.decrypt(&staged.value_ciphertext).unwrap().as_str(), row.label);
            assert!(old.decrypt(&staged.value_ciphertext).is_err());
        }
    }

    #[test]
    fn staging_stops_on_undecryptable_row() {
        let rows = vec![SecretRow {
            id: "bad".into(),
            label: "bad".into(),
            kind: "password".into(),
            value_ciphertext: cipher(9).encrypt("x").unwrap(),
            creation_time: 1,
            update_time: 1,
        }];
        assert!(matches!(
            RotationPlan::stage(&rows, &cipher(1), &cipher(2), pending_master()),
            Err(StoreError::RotationFailed(_))
        ));
    }

    #[tokio::test]
    async fn failed_apply_rolls_back_everything() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir.path().join("rot.db")).await.unwrap();
        let salts = SaltStore::new(pool.clone());
        let salt = salts.generate_and_persist().await.unwrap();
        let old = cipher(1);
        salts
            .mark_configured(&salt, &old.verifier(), &KdfParams::new(256, 1, 1))
            .await
            .unwrap();

        let session = Session::new(Duration::ZERO);
        session.bind(cipher(1)).await;
        let repo = SecretRepository::new(pool.clone(), session);
        let id = repo.save("keep", "value", "password").await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let rows = fetch_all_rows(&mut *conn).await.unwrap();
        drop(conn);
        let mut plan = RotationPlan::stage(&rows, &old, &cipher(2), pending_master()).unwrap();
        // Fault injection: a record that vanished between staging and commit.
        plan.push_record(PendingRecord {
            id: "vanished".into(),
            value_ciphertext: "x".into(),
        });

        let mut tx = pool.begin().await.unwrap();
        let err = plan.apply(&mut *tx).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        tx.rollback().await.unwrap();

        // Master row and record are exactly as before.
        let record = salts.load_record().await.unwrap();
        assert_eq!(record.salt, salt.to_vec());
        assert!(old.verifies(&record.verifier));
        assert_eq!(repo.get_by_id(&id).await.unwrap().value.as_str(), "value");
    }
}
