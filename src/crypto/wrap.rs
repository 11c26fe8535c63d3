//! Session key wrapping (ECIES over X25519).
//!
//! Layout of a wrapped key: `ephemeral_pub (32) || AES-256-GCM(session key) (48)`.
//! The AEAD key and nonce come from HKDF-SHA256 over the X25519 shared secret,
//! salted with both public keys. A fresh ephemeral key per wrap makes the
//! derived nonce single-use.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};

use crate::crypto::cipher::{self, NONCE_LEN, SYMMETRIC_KEY_LEN, TAG_LEN};
use crate::crypto::{CryptoError, PrivateKey, PublicKey, SymmetricKey};

/// Total size of a wrapped session key.
pub const WRAPPED_KEY_LEN: usize = 32 + SYMMETRIC_KEY_LEN + TAG_LEN;

const WRAP_INFO_KEY: &[u8] = b"ciphertalk-wrap-v1-key";
const WRAP_INFO_NONCE: &[u8] = b"ciphertalk-wrap-v1-nonce";

fn derive_wrap_key(
    shared_secret: &[u8; 32],
    ephemeral_pub: &[u8; 32],
    recipient_pub: &[u8; 32],
) -> Result<([u8; 32], [u8; NONCE_LEN]), CryptoError> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral_pub);
    salt[32..].copy_from_slice(recipient_pub);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut key = [0u8; 32];
    hk.expand(WRAP_INFO_KEY, &mut key)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    let mut nonce = [0u8; NONCE_LEN];
    hk.expand(WRAP_INFO_NONCE, &mut nonce)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    Ok((key, nonce))
}

/// Encrypt `session_key` so that only the holder of `recipient`'s private key
/// can recover it.
pub fn wrap_key(session_key: &SymmetricKey, recipient: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    let recipient_x = recipient.to_x25519();
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_pub = X25519PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(&recipient_x);
    if !shared.was_contributory() {
        return Err(CryptoError::NonContributory);
    }

    let (key, nonce) = derive_wrap_key(
        shared.as_bytes(),
        ephemeral_pub.as_bytes(),
        recipient_x.as_bytes(),
    )?;
    let sealed = cipher::seal(&key, &nonce, session_key.as_bytes())?;

    let mut wrapped = Vec::with_capacity(WRAPPED_KEY_LEN);
    wrapped.extend_from_slice(ephemeral_pub.as_bytes());
    wrapped.extend_from_slice(&sealed);
    Ok(wrapped)
}

/// Recover a session key wrapped for `own_private`.
pub fn unwrap_key(wrapped: &[u8], own_private: &PrivateKey) -> Result<SymmetricKey, CryptoError> {
    if wrapped.len() != WRAPPED_KEY_LEN {
        return Err(CryptoError::UnwrapFailed);
    }

    let mut ephemeral_bytes = [0u8; 32];
    ephemeral_bytes.copy_from_slice(&wrapped[..32]);
    let ephemeral_pub = X25519PublicKey::from(ephemeral_bytes);

    let secret = own_private.to_x25519();
    let own_pub = X25519PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&ephemeral_pub);
    if !shared.was_contributory() {
        return Err(CryptoError::UnwrapFailed);
    }

    let (key, nonce) = derive_wrap_key(shared.as_bytes(), &ephemeral_bytes, own_pub.as_bytes())
        .map_err(|_| CryptoError::UnwrapFailed)?;
    let raw = cipher::open(&key, &nonce, &wrapped[32..]).map_err(|_| CryptoError::UnwrapFailed)?;

    let bytes: [u8; SYMMETRIC_KEY_LEN] = raw
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::UnwrapFailed)?;
    Ok(SymmetricKey::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_symmetric_key, IdentityKeyPair};

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let bob = IdentityKeyPair::generate();
        let sk = generate_symmetric_key();

        let wrapped = wrap_key(&sk, bob.public_key()).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_KEY_LEN);
        assert_eq!(unwrap_key(&wrapped, bob.private_key()).unwrap(), sk);
    }

    #[test]
    fn test_wrapping_is_randomized() {
        let bob = IdentityKeyPair::generate();
        let sk = generate_symmetric_key();
        let a = wrap_key(&sk, bob.public_key()).unwrap();
        let b = wrap_key(&sk, bob.public_key()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unwrap_with_wrong_private_key_fails() {
        let bob = IdentityKeyPair::generate();
        let eve = IdentityKeyPair::generate();
        let wrapped = wrap_key(&generate_symmetric_key(), bob.public_key()).unwrap();

        assert_eq!(
            unwrap_key(&wrapped, eve.private_key()),
            Err(CryptoError::UnwrapFailed)
        );
    }

    #[test]
    fn test_unwrap_corrupted_fails() {
        let bob = IdentityKeyPair::generate();
        let mut wrapped = wrap_key(&generate_symmetric_key(), bob.public_key()).unwrap();
        wrapped[40] ^= 0x80;
        assert!(unwrap_key(&wrapped, bob.private_key()).is_err());
    }

    #[test]
    fn test_unwrap_wrong_length_fails() {
        let bob = IdentityKeyPair::generate();
        assert!(unwrap_key(&[0u8; 10], bob.private_key()).is_err());
        assert!(unwrap_key(&[], bob.private_key()).is_err());
    }

    #[test]
    fn test_unwrap_low_order_ephemeral_fails() {
        let bob = IdentityKeyPair::generate();
        // All-zero u-coordinate is a low-order point.
        let wrapped = [0u8; WRAPPED_KEY_LEN];
        assert_eq!(
            unwrap_key(&wrapped, bob.private_key()),
            Err(CryptoError::UnwrapFailed)
        );
    }
}
