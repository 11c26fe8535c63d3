//! SHA-256 helpers and randomness.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::crypto::{codec, CryptoError, PublicKey};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Hex fingerprint of an identity, computed over its encoded public key so
/// that both sides can compare it out of band.
pub fn fingerprint(public_key: &PublicKey) -> Result<String, CryptoError> {
    let encoded = codec::encode_public_key(public_key)?;
    Ok(hex::encode(sha256(encoded.as_bytes())))
}

/// `len` bytes from the OS CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Salted SHA-256 of a password, base64 encoded.
pub fn hash_password(password: &str, salt: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}
