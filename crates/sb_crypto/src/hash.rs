//! BLAKE3-based hash utilities
//!
//! The password verifier is a keyed hash of a fixed domain string under the
//! master key: reproducible only with the right key, and it reveals nothing
//! about the key or any stored secret.

pub const VERIFIER_LEN: usize = 32;

const VERIFIER_DOMAIN: &[u8] = b"sb-verifier-v1";

/// Keyed hash, used for MACs where a key context differentiates domains.
pub fn keyed_hash(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    blake3::keyed_hash(key, data).into()
}

/// Compute the master-password verifier for `key`.
pub fn verifier(key: &[u8; 32]) -> [u8; VERIFIER_LEN] {
    keyed_hash(key, VERIFIER_DOMAIN)
}

/// Check `stored` against the verifier for `key`.
///
/// `blake3::Hash` equality runs in constant time, so the comparison does not
/// leak how many leading bytes matched.
pub fn verifier_matches(key: &[u8; 32], stored: &[u8]) -> bool {
    let Ok(stored): Result<[u8; VERIFIER_LEN], _> = stored.try_into() else {
        return false;
    };
    blake3::keyed_hash(key, VERIFIER_DOMAIN) == blake3::Hash::from(stored)
}
