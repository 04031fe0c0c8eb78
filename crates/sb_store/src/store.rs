//! `SecretStore`: the one handle front ends hold.
//!
//! Owns the pool, the session and the two services built on them. Two stores
//! opened on different directories share nothing.

use std::time::Duration;

use tracing::info;

use crate::{
    config::StoreConfig,
    credential::CredentialProvider,
    db,
    error::StoreError,
    master::{MasterPassword, MasterState},
    models::{Secret, SecretMeta},
    repository::SecretRepository,
    salt::SaltStore,
    session::Session,
};

pub struct SecretStore {
    master: MasterPassword,
    secrets: SecretRepository,
    session: Session,
}

impl SecretStore {
    /// Open (or create) the store described by `config`.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = db::open_pool(&config.db_path()).await?;
        let session = Session::new(Duration::from_secs(config.idle_lock_secs));
        let master = MasterPassword::new(
            pool.clone(),
            SaltStore::new(pool.clone()),
            session.clone(),
            config.kdf,
        );
        let secrets = SecretRepository::new(pool, session.clone());
        info!(
            data_dir = %config.data_dir.display(),
            idle_lock_secs = config.idle_lock_secs,
            "[store] ready"
        );
        Ok(Self {
            master,
            secrets,
            session,
        })
    }

    pub async fn status(&self) -> Result<MasterState, StoreError> {
        self.master.state().await
    }

    /// Seconds left before the session idles out; `None` when locked.
    pub async fn time_until_lock(&self) -> Option<u64> {
        self.session.time_until_lock().await
    }

    // ── Master password ─────────────────────────────────────────────────────

    pub async fn is_master_configured(&self) -> Result<bool, StoreError> {
        Ok(self.master.state().await? != MasterState::Unset)
    }

    pub async fn set_master_password(&self, password: &str) -> Result<(), StoreError> {
        self.master.set(password).await
    }

    pub async fn set_master_password_with(
        &self,
        credentials: &dyn CredentialProvider,
    ) -> Result<(), StoreError> {
        self.master.set_with(credentials).await
    }

    pub async fn verify_master_password(&self, password: &str) -> Result<bool, StoreError> {
        self.master.verify(password).await
    }

    pub async fn activate_session(&self, password: &str) -> Result<(), StoreError> {
        self.master.activate(password).await
    }

    pub async fn activate_session_with(
        &self,
        credentials: &dyn CredentialProvider,
    ) -> Result<(), StoreError> {
        self.master.activate_with(credentials).await
    }

    pub async fn lock_session(&self) {
        self.master.lock().await
    }

    pub async fn rotate_master_password(&self, old: &str, new: &str) -> Result<(), StoreError> {
        self.master.rotate(old, new).await
    }

    // ── Secrets ─────────────────────────────────────────────────────────────

    pub async fn list_secrets(&self) -> Result<Vec<SecretMeta>, StoreError> {
        self.secrets.list().await
    }

    /// Look up by id first, then by label.
    pub async fn get_secret(&self, id_or_label: &str) -> Result<Secret, StoreError> {
        match self.secrets.get_by_id(id_or_label).await {
            Err(StoreError::NotFound(_)) => self.secrets.get(id_or_label).await,
            other => other,
        }
    }

    pub async fn create_secret(
        &self,
        label: &str,
        plaintext: &str,
        kind: &str,
    ) -> Result<String, StoreError> {
        self.secrets.save(label, plaintext, kind).await
    }

    pub async fn update_secret(&self, id: &str, plaintext: &str) -> Result<(), StoreError> {
        self.secrets.update(id, plaintext).await
    }

    pub async fn delete_secret(&self, id: &str) -> Result<(), StoreError> {
        self.secrets.delete(id).await
    }

    pub async fn search_secrets(&self, query: &str) -> Result<Vec<SecretMeta>, StoreError> {
        self.secrets.search(query).await
    }
}
