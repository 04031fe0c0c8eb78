//! `SecretCipher`: the runtime cipher bound to a verified master key.
//!
//! Each secret value is sealed with XChaCha20-Poly1305 into one text token
//! that fits a TEXT column:
//!
//!   base64url-no-pad( nonce (24) | ciphertext | tag (16) )
//!
//! The nonce is random per token, so sealing the same plaintext twice never
//! yields the same token. Every token is bound to the `sb-secret-v1` AAD.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroizing;

use crate::{error::CryptoError, hash, kdf::MasterKey};

pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

const SECRET_AAD: &[u8] = b"sb-secret-v1";

#[derive(Debug)]
pub struct SecretCipher {
    key: MasterKey,
}

impl SecretCipher {
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    fn aead(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()))
    }

    /// Seal `plaintext` into a fresh token.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = self
            .aead()
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: SECRET_AAD,
                },
            )
            .map_err(|_| CryptoError::AeadEncrypt)?;

        let mut token = Vec::with_capacity(NONCE_LEN + sealed.len());
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Open a token produced by [`SecretCipher::encrypt`].
    ///
    /// Bad encoding, short tokens, a wrong key and tampered bytes are all
    /// reported as [`CryptoError::AeadDecrypt`].
    pub fn decrypt(&self, token: &str) -> Result<Zeroizing<String>, CryptoError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CryptoError::AeadDecrypt)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::AeadDecrypt);
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let opened = Zeroizing::new(
            self.aead()
                .decrypt(
                    XNonce::from_slice(nonce),
                    Payload {
                        msg: sealed,
                        aad: SECRET_AAD,
                    },
                )
                .map_err(|_| CryptoError::AeadDecrypt)?,
        );
        let text = std::str::from_utf8(&opened).map_err(|_| CryptoError::AeadDecrypt)?;
        Ok(Zeroizing::new(text.to_owned()))
    }

    pub fn verifier(&self) -> [u8; hash::VERIFIER_LEN] {
        hash::verifier(self.key.as_bytes())
    }

    pub fn verifies(&self, stored: &[u8]) -> bool {
        hash::verifier_matches(self.key.as_bytes(), stored)
    }
}
