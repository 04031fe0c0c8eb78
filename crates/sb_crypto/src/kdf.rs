//! Key derivation
//!
//! `derive_key`: Argon2id, derives the 32-byte key that encrypts every stored
//! secret value from the master password and the installation salt.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// 32-byte key derived from the master password. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Argon2id cost parameters. Persisted next to the salt, so a store keeps
/// deriving with the cost it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// m_cost in KiB
    pub memory_kib: u32,
    /// t_cost
    pub iterations: u32,
    /// p_cost
    pub parallelism: u32,
}

impl KdfParams {
    pub const fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn to_argon2(self) -> Result<Params, CryptoError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
    }
}

/// Tuned for interactive desktop use: 64 MiB, 3 passes, 1 lane.
impl Default for KdfParams {
    fn default() -> Self {
        Self::new(64 * 1024, 3, 1)
    }
}

/// Derive the master key from a password + salt.
///
/// Deterministic: identical inputs always yield the identical key. This is
/// slow on purpose; async callers should run it on a blocking thread.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<MasterKey, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::InvalidInput("empty password"));
    }
    if salt.is_empty() {
        return Err(CryptoError::InvalidInput("empty salt"));
    }
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
    let mut output = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(MasterKey(output))
}

/// Generate a fresh random 16-byte salt (once per installation, and on rotation).
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}
