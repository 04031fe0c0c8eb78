//! Credential providers: "supply a password string on demand".
//!
//! The store never prompts by itself. Front ends pass whatever provider fits
//! (terminal prompt, environment, fixed value in tests).

use zeroize::Zeroizing;

use crate::error::StoreError;

pub trait CredentialProvider: Send + Sync {
    /// Return the password for `purpose` (e.g. "unlock", "new master password").
    fn password(&self, purpose: &str) -> Result<Zeroizing<String>, StoreError>;
}

/// A fixed password.
pub struct StaticCredential(Zeroizing<String>);

impl StaticCredential {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }
}

impl CredentialProvider for StaticCredential {
    fn password(&self, _purpose: &str) -> Result<Zeroizing<String>, StoreError> {
        Ok(self.0.clone())
    }
}

/// Reads the password from an environment variable. Absent or empty is an error.
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredential {
    fn password(&self, purpose: &str) -> Result<Zeroizing<String>, StoreError> {
        match std::env::var(&self.var) {
            Ok(pw) if !pw.is_empty() => Ok(Zeroizing::new(pw)),
            _ => Err(StoreError::InvalidInput(format!(
                "{} not set ({purpose})",
                self.var
            ))),
        }
    }
}
