//! Error types shared by the codec and the primitive engine.

use thiserror::Error;

/// Failure to turn encoded text back into key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("unexpected key format (wrong algorithm or DER structure)")]
    UnexpectedKeyFormat,
    #[error("invalid key material")]
    InvalidKey,
}

/// Failure of a cryptographic primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("key could not be DER-encoded")]
    KeyEncoding,
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("key agreement produced a non-contributory secret")]
    NonContributory,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("session key could not be unwrapped")]
    UnwrapFailed,
}
