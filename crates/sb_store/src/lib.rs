//! sb_store: encrypted local secret store for Sealbox.
//!
//! Uses SQLite via sqlx in WAL mode with a single writer connection.
//!
//! # Encryption strategy
//! - The master password never touches disk. Argon2id turns it plus a per-store
//!   salt into a 256-bit key; a keyed BLAKE3 verifier of that key is what gets
//!   persisted, next to the salt and the KDF cost, in the `master_state` row.
//! - Each secret value is sealed with XChaCha20-Poly1305 under the session key
//!   and stored as a single base64 token. Labels, types and timestamps are
//!   stored in the clear.
//! - The key only lives in the [`Session`], is zeroized on lock, and is dropped
//!   automatically after the configured idle period.
//! - Rotation re-encrypts every record and replaces the master row inside one
//!   SQLite transaction: either all of it lands or none of it does.

pub mod config;
pub mod credential;
pub mod db;
pub mod error;
pub mod master;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod salt;
pub mod session;
pub mod store;

mod rotation;

pub use config::StoreConfig;
pub use credential::{CredentialProvider, EnvCredential, StaticCredential};
pub use error::StoreError;
pub use master::{MasterPassword, MasterState};
pub use models::{Secret, SecretMeta};
pub use repository::SecretRepository;
pub use salt::SaltStore;
pub use session::Session;
pub use store::SecretStore;

/// Wall-clock seconds since the Unix epoch.
pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
