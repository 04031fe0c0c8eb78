//! Database row models; these map to/from SQL rows.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub const DEFAULT_SECRET_TYPE: &str = "password";

/// A full `secrets` row. The value column only ever holds a cipher token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SecretRow {
    pub id: String,
    pub label: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub value_ciphertext: String,
    /// epoch seconds
    pub creation_time: i64,
    /// epoch seconds, never below `creation_time`
    pub update_time: i64,
}

/// Listing view of a secret: everything except the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SecretMeta {
    pub id: String,
    pub label: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub creation_time: i64,
    pub update_time: i64,
}

/// A decrypted secret handed back by `get`.
pub struct Secret {
    pub value: Zeroizing<String>,
    pub kind: String,
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("value", &"<redacted>")
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MasterRow {
    pub salt: Vec<u8>,
    pub configured: bool,
    pub verifier: Option<Vec<u8>>,
    pub kdf_m_cost: i64,
    pub kdf_t_cost: i64,
    pub kdf_p_cost: i64,
    pub updated_at: i64,
}
