//! Textual key encodings.
//!
//! Keys travel as standard base64 (padded, unwrapped) of their export form:
//! - public keys: DER `SubjectPublicKeyInfo` for Ed25519 (RFC 8410)
//! - private keys: DER PKCS#8 `PrivateKeyInfo` for Ed25519 (RFC 8410); v1 is
//!   written, v1 and v2 (`OneAsymmetricKey`) are read
//! - session keys: the 32 raw key bytes

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::pkcs8::{
    self, spki, DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey,
    KeypairBytes,
};
use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::crypto::cipher::SYMMETRIC_KEY_LEN;
use crate::crypto::{CryptoError, DecodeError, PrivateKey, PublicKey, SymmetricKey};

/// Encode raw bytes as standard base64.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(text)?)
}

pub fn encode_public_key(key: &PublicKey) -> Result<String, CryptoError> {
    let der = key
        .verifying_key()
        .to_public_key_der()
        .map_err(|_| CryptoError::KeyEncoding)?;
    Ok(encode_bytes(der.as_bytes()))
}

pub fn encode_private_key(key: &PrivateKey) -> Result<String, CryptoError> {
    let v1 = KeypairBytes {
        secret_key: key.to_bytes(),
        public_key: None,
    };
    let der = v1.to_pkcs8_der().map_err(|_| CryptoError::KeyEncoding)?;
    Ok(encode_bytes(der.as_bytes()))
}

pub fn encode_symmetric_key(key: &SymmetricKey) -> String {
    encode_bytes(key.as_bytes())
}

pub fn decode_public_key(text: &str) -> Result<PublicKey, DecodeError> {
    let der = decode_bytes(text)?;
    let key = VerifyingKey::from_public_key_der(&der).map_err(|err| match err {
        spki::Error::KeyMalformed => DecodeError::InvalidKey,
        _ => DecodeError::UnexpectedKeyFormat,
    })?;
    PublicKey::from_bytes(&key.to_bytes()).ok_or(DecodeError::InvalidKey)
}

pub fn decode_private_key(text: &str) -> Result<PrivateKey, DecodeError> {
    let der = decode_bytes(text)?;
    let key = SigningKey::from_pkcs8_der(&der).map_err(|err| match err {
        pkcs8::Error::KeyMalformed => DecodeError::InvalidKey,
        _ => DecodeError::UnexpectedKeyFormat,
    })?;
    Ok(PrivateKey::from_bytes(&key.to_bytes()))
}

pub fn decode_symmetric_key(text: &str) -> Result<SymmetricKey, DecodeError> {
    let raw = decode_bytes(text)?;
    let bytes: [u8; SYMMETRIC_KEY_LEN] =
        raw.as_slice()
            .try_into()
            .map_err(|_| DecodeError::InvalidLength {
                expected: SYMMETRIC_KEY_LEN,
                actual: raw.len(),
            })?;
    Ok(SymmetricKey::from_bytes(bytes))
}
