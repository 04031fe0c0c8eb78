//! sb_crypto: Sealbox cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Keys only leave this crate wrapped in opaque newtypes.
//!
//! # Module layout
//! - `kdf`: Argon2id master-password key derivation + salt generation
//! - `cipher`: `SecretCipher`, XChaCha20-Poly1305 text tokens for stored secret values
//! - `hash`: BLAKE3 keyed hashing (password verifier)
//! - `error`: unified error type

pub mod cipher;
pub mod error;
pub mod hash;
pub mod kdf;

pub use cipher::SecretCipher;
pub use error::CryptoError;
pub use kdf::{KdfParams, MasterKey};
