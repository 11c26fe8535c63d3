//! Identity key pair utilities.
//!
//! An identity is a single Ed25519 key pair. It signs messages directly and,
//! through its X25519 (Montgomery) form, receives wrapped session keys.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use x25519_dalek::StaticSecret;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Public half of an identity (Ed25519, 32 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

/// Private half of an identity (Ed25519 seed, 32 bytes).
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

/// A long-lived identity key pair.
#[derive(Clone)]
pub struct IdentityKeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl PublicKey {
    /// Parse a raw 32-byte key, rejecting invalid and small-order points.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        let key = VerifyingKey::from_bytes(bytes).ok()?;
        if key.is_weak() {
            return None;
        }
        Some(Self(key))
    }

    /// Raw 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// X25519 form of this key, used as the key-wrapping recipient.
    pub(crate) fn to_x25519(self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(self.0.to_montgomery().to_bytes())
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl PrivateKey {
    /// Build a private key from its 32-byte seed.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    /// The 32-byte seed.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Public key derived from this private key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub(crate) fn to_x25519(&self) -> StaticSecret {
        StaticSecret::from(self.0.to_scalar_bytes())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.0
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for PrivateKey {}

impl IdentityKeyPair {
    /// Generate a new random key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self::from_private_key(PrivateKey(signing))
    }

    /// Create a key pair from an existing private key.
    pub fn from_private_key(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    /// Pair a stored public key with a stored private key, if they match.
    pub fn from_parts(public: PublicKey, private: PrivateKey) -> Option<Self> {
        if private.public_key() != public {
            return None;
        }
        Some(Self { public, private })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }
}

/// Sign `message` with the identity private key.
pub fn sign(message: &[u8], private_key: &PrivateKey) -> [u8; SIGNATURE_LEN] {
    let signature: Signature = private_key.signing_key().sign(message);
    signature.to_bytes()
}

/// Verify `signature` over `message`. Malformed input yields `false`.
pub fn verify(message: &[u8], signature: &[u8], public_key: &PublicKey) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    public_key
        .verifying_key()
        .verify_strict(message, &signature)
        .is_ok()
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &hex::encode(self.public.to_bytes()))
            .field("private", &"[REDACTED]")
            .finish()
    }
}
