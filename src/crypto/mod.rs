//! Cryptographic primitives for CipherTalk.
//!
//! This module provides:
//! - Key codec (base64 export formats)
//! - Identity key pairs with Ed25519 signatures
//! - AES-256-GCM session encryption
//! - ECIES session key wrapping over X25519
//! - SHA-256 helpers

pub mod codec;
mod cipher;
mod error;
mod hash;
mod keypair;
mod wrap;

pub use cipher::{
    decrypt, encrypt, generate_symmetric_key, EncryptedPayload, SymmetricKey, NONCE_LEN,
    SYMMETRIC_KEY_LEN, TAG_LEN,
};
pub use error::{CryptoError, DecodeError};
pub use hash::{fingerprint, hash_password, random_bytes, sha256};
pub use keypair::{sign, verify, IdentityKeyPair, PrivateKey, PublicKey, SIGNATURE_LEN};
pub use wrap::{unwrap_key, wrap_key, WRAPPED_KEY_LEN};

/// Generate a fresh identity key pair.
pub fn generate_asymmetric_key_pair() -> IdentityKeyPair {
    IdentityKeyPair::generate()
}
