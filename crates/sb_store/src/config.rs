//! Store configuration: where the database lives, how expensive key
//! derivation is, and how long an idle session stays unlocked.
//!
//! Every field can be overridden from the environment:
//!
//! | variable | field |
//! |---|---|
//! | `SEALBOX_DATA_DIR` | `data_dir` |
//! | `SEALBOX_KDF_MEMORY_KIB` | `kdf.memory_kib` |
//! | `SEALBOX_KDF_ITERATIONS` | `kdf.iterations` |
//! | `SEALBOX_KDF_PARALLELISM` | `kdf.parallelism` |
//! | `SEALBOX_IDLE_LOCK_SECS` | `idle_lock_secs` (0 disables auto-lock) |

use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use sb_crypto::KdfParams;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const APP_QUALIFIER: &str = "dev";
pub const APP_ORG: &str = "sealbox";
pub const APP_NAME: &str = "sealbox";

pub const DB_FILE_NAME: &str = "sealbox.db";
pub const DEFAULT_IDLE_LOCK_SECS: u64 = 1800; // 30 minutes

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    #[serde(default = "default_db_file")]
    pub db_file: String,
    /// Cost used for `set` and `rotate`; existing stores keep the cost they
    /// were written with until rotated.
    #[serde(default)]
    pub kdf: KdfParams,
    #[serde(default = "default_idle_lock_secs")]
    pub idle_lock_secs: u64,
}

impl StoreConfig {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            db_file: default_db_file(),
            kdf: KdfParams::default(),
            idle_lock_secs: DEFAULT_IDLE_LOCK_SECS,
        }
    }

    /// Platform data directory, with `SEALBOX_*` overrides applied.
    pub fn from_env() -> Result<Self, StoreError> {
        let data_dir = match std::env::var("SEALBOX_DATA_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };
        let mut config = Self::new(data_dir);
        if let Some(v) = env_parse("SEALBOX_KDF_MEMORY_KIB")? {
            config.kdf.memory_kib = v;
        }
        if let Some(v) = env_parse("SEALBOX_KDF_ITERATIONS")? {
            config.kdf.iterations = v;
        }
        if let Some(v) = env_parse("SEALBOX_KDF_PARALLELISM")? {
            config.kdf.parallelism = v;
        }
        if let Some(v) = env_parse("SEALBOX_IDLE_LOCK_SECS")? {
            config.idle_lock_secs = v;
        }
        Ok(config)
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_idle_lock_secs(mut self, secs: u64) -> Self {
        self.idle_lock_secs = secs;
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }
}

pub fn default_data_dir() -> Result<PathBuf, StoreError> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| StoreError::InvalidInput("cannot determine data directory".into()))?;
    Ok(dirs.data_dir().to_path_buf())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| StoreError::InvalidInput(format!("{name}: {e}"))),
        _ => Ok(None),
    }
}

fn default_db_file() -> String {
    DB_FILE_NAME.to_string()
}

fn default_idle_lock_secs() -> u64 {
    DEFAULT_IDLE_LOCK_SECS
}
