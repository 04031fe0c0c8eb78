use sb_crypto::CryptoError;
use thiserror::Error;

/// Failures surfaced by the store.
///
/// `Unauthorized` and `Integrity` render identically: an observer only learns
/// that authentication failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Master password is already set")]
    AlreadyInitialized,

    #[error("Master password has not been set")]
    NotConfigured,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Store is locked; activate a session with the master password first")]
    Unauthenticated,

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Authentication failed")]
    Integrity,

    #[error("Master password rotation failed, store left unchanged: {0}")]
    RotationFailed(String),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// True for the two kinds an external caller must not tell apart.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, StoreError::Unauthorized | StoreError::Integrity)
    }
}

impl From<CryptoError> for StoreError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AeadDecrypt => StoreError::Integrity,
            CryptoError::InvalidInput(what) => StoreError::InvalidInput(what.to_string()),
            CryptoError::KeyDerivation(msg) => StoreError::InvalidInput(msg),
            CryptoError::AeadEncrypt => StoreError::Encryption,
        }
    }
}
