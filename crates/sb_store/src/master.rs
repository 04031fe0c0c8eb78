//! Master password lifecycle: set, verify, activate, rotate.
//!
//! ```text
//! Unset ──set──▶ Set ──activate──▶ Authenticated
//!                 ▲  ◀────lock────
//!                 └── rotate (transient Rotating) ──┘
//! ```
//!
//! The password itself is never stored. A verifier derived from the key lets
//! `verify` check a candidate without decrypting any secret.

use std::sync::atomic::{AtomicBool, Ordering};

use sb_crypto::{kdf, KdfParams, MasterKey, SecretCipher};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{
    credential::CredentialProvider,
    error::StoreError,
    repository,
    rotation::{PendingMaster, RotationPlan},
    salt::SaltStore,
    session::Session,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterState {
    /// No master password has ever been set.
    Unset,
    /// Set, but no cipher is bound to the session.
    Unauthenticated,
    /// Set, and the session holds a live cipher.
    Authenticated,
    /// A rotation is in progress.
    Rotating,
}

pub struct MasterPassword {
    pool: SqlitePool,
    salts: SaltStore,
    session: Session,
    /// Cost for new salts (set/rotate).
    kdf: KdfParams,
    rotating: AtomicBool,
}

impl MasterPassword {
    pub fn new(pool: SqlitePool, salts: SaltStore, session: Session, kdf: KdfParams) -> Self {
        Self {
            pool,
            salts,
            session,
            kdf,
            rotating: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> Result<MasterState, StoreError> {
        if self.rotating.load(Ordering::Acquire) {
            return Ok(MasterState::Rotating);
        }
        if !self.salts.is_configured().await? {
            return Ok(MasterState::Unset);
        }
        Ok(if self.session.is_active().await {
            MasterState::Authenticated
        } else {
            MasterState::Unauthenticated
        })
    }

    /// First-time setup. Fails with `AlreadyInitialized` once configured.
    pub async fn set(&self, password: &str) -> Result<(), StoreError> {
        if password.is_empty() {
            return Err(StoreError::InvalidInput("master password must not be empty".into()));
        }
        if self.salts.is_configured().await? {
            return Err(StoreError::AlreadyInitialized);
        }
        // The salt is durable before a key is ever derived from it.
        let salt = self.salts.generate_and_persist().await?;
        let key = derive(password, salt.to_vec(), self.kdf).await?;
        let verifier = SecretCipher::new(key).verifier();
        self.salts.mark_configured(&salt, &verifier, &self.kdf).await?;
        info!(
            memory_kib = self.kdf.memory_kib,
            iterations = self.kdf.iterations,
            "[master] master password set"
        );
        Ok(())
    }

    pub async fn set_with(&self, credentials: &dyn CredentialProvider) -> Result<(), StoreError> {
        let password = credentials.password("new master password")?;
        self.set(&password).await
    }

    /// True iff `password` is the current master password. A wrong password
    /// is `Ok(false)`, never an error.
    pub async fn verify(&self, password: &str) -> Result<bool, StoreError> {
        Ok(self.check(password).await?.is_some())
    }

    /// Verify and bind the cipher for this session. `Unauthorized` on mismatch.
    pub async fn activate(&self, password: &str) -> Result<(), StoreError> {
        match self.check(password).await? {
            Some(cipher) => {
                self.session.bind(cipher).await;
                info!("[master] session activated");
                Ok(())
            }
            None => {
                warn!("[master] activation rejected");
                Err(StoreError::Unauthorized)
            }
        }
    }

    pub async fn activate_with(&self, credentials: &dyn CredentialProvider) -> Result<(), StoreError> {
        let password = credentials.password("unlock")?;
        self.activate(&password).await
    }

    pub async fn lock(&self) {
        self.session.lock().await;
        info!("[master] session locked");
    }

    /// Change the master password and re-encrypt every secret under the new key.
    ///
    /// `old` is verified before anything else; `Unauthorized` if it does not
    /// match. Every later failure, an empty `new` included, is `RotationFailed`
    /// with the store left exactly as it was. A bound session is switched to
    /// the new key; a locked one stays locked.
    pub async fn rotate(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let old_cipher = self.check(old).await?.ok_or_else(|| {
            warn!("[master] rotation rejected: old password does not verify");
            StoreError::Unauthorized
        })?;
        if new.is_empty() {
            return Err(StoreError::RotationFailed("new master password must not be empty".into()));
        }

        let new_salt = kdf::generate_salt();
        let new_cipher = SecretCipher::new(
            derive(new, new_salt.to_vec(), self.kdf)
                .await
                .map_err(|e| StoreError::RotationFailed(e.to_string()))?,
        );
        let master = PendingMaster {
            salt: new_salt.to_vec(),
            verifier: new_cipher.verifier().to_vec(),
            params: self.kdf,
        };

        // No repository call can observe the store until the new key is bound.
        let mut session = self.session.exclusive().await;
        self.rotating.store(true, Ordering::Release);
        let outcome = self.commit_rotation(&old_cipher, &new_cipher, master).await;
        self.rotating.store(false, Ordering::Release);

        match outcome {
            Ok(count) => {
                let rebound = self.session.rebind_if_active(&mut session, new_cipher);
                info!(records = count, session_rebound = rebound, "[master] master password rotated");
                Ok(())
            }
            Err(e) => {
                warn!("[master] rotation rolled back: {e}");
                Err(match e {
                    StoreError::RotationFailed(_) => e,
                    other => StoreError::RotationFailed(other.to_string()),
                })
            }
        }
    }

    async fn commit_rotation(
        &self,
        old: &SecretCipher,
        new: &SecretCipher,
        master: PendingMaster,
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let staged = match repository::fetch_all_rows(&mut *tx).await {
            Ok(rows) => RotationPlan::stage(&rows, old, new, master),
            Err(e) => Err(e),
        };
        let applied = match staged {
            Ok(plan) => {
                debug!(records = plan.len(), "[master] rotation staged");
                plan.apply(&mut *tx).await
            }
            Err(e) => Err(e),
        };
        match applied {
            Ok(count) => {
                tx.commit().await?;
                Ok(count)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("[master] explicit rollback failed, relying on drop: {rollback}");
                }
                Err(e)
            }
        }
    }

    /// Derive from the stored salt/cost and compare against the verifier.
    /// `Some(cipher)` on match.
    async fn check(&self, password: &str) -> Result<Option<SecretCipher>, StoreError> {
        let record = self.salts.load_record().await?;
        if password.is_empty() {
            return Ok(None);
        }
        let cipher = SecretCipher::new(derive(password, record.salt, record.params).await?);
        Ok(cipher.verifies(&record.verifier).then_some(cipher))
    }
}

/// Argon2 on the blocking pool.
async fn derive(password: &str, salt: Vec<u8>, params: KdfParams) -> Result<MasterKey, StoreError> {
    let password = Zeroizing::new(password.to_owned());
    let key = tokio::task::spawn_blocking(move || kdf::derive_key(password.as_bytes(), &salt, &params))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;
    Ok(key)
}
