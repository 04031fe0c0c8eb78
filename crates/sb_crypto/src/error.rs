use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    /// Wrong key, altered bytes and malformed tokens all land here.
    #[error("AEAD decryption failed")]
    AeadDecrypt,
}
