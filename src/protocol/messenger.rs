//! Secure messaging: key exchange and hybrid encryption of chat messages.
//!
//! Secure messages carry everything the recipient needs: the payload sealed
//! under a session key, that session key wrapped for the recipient, a
//! signature over the plaintext and the sender's public key. Signatures cover
//! what the user reads (the plaintext, or the encoded session key for a key
//! exchange), so they are checked only after decryption succeeds.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use crate::crypto::{
    self, codec, CryptoError, DecodeError, IdentityKeyPair, PublicKey, SymmetricKey,
};
use crate::identity::{IdentityError, IdentityManager};
use crate::protocol::envelope::{EncryptedContent, KeyExchangeEnvelope, SecureEnvelope};
use crate::store::{DurableStore, KeyDirection, SessionKeyStore};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("identity is not initialized; call `initialize` first")]
    NotInitialized,
    #[error("malformed envelope field: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("signature does not verify")]
    SignatureInvalid,
    #[error("envelope has no sender")]
    MissingSender,
    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

/// An opened secure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    pub content: String,
    pub sender: Option<String>,
    /// Signature verified against the embedded sender key. Always `true` for
    /// messages returned by [`SecureMessenger::decrypt_envelope`].
    pub authentic: bool,
}

/// Entry point for every secure operation the rest of the client performs.
pub struct SecureMessenger<S> {
    identity: IdentityManager<S>,
    sessions: Arc<SessionKeyStore>,
    local_user: Option<String>,
}

impl<S: DurableStore> SecureMessenger<S> {
    pub fn new(identity: IdentityManager<S>, sessions: Arc<SessionKeyStore>) -> Self {
        Self {
            identity,
            sessions,
            local_user: None,
        }
    }

    /// Set the username written into the `sender` field of outgoing envelopes.
    pub fn with_local_user(mut self, user: impl Into<String>) -> Self {
        self.local_user = Some(user.into());
        self
    }

    /// Load or create the identity. Must complete before any other operation.
    pub fn initialize(&self) -> Result<(), IdentityError> {
        self.identity.initialize()
    }

    pub fn identity(&self) -> &IdentityManager<S> {
        &self.identity
    }

    pub fn sessions(&self) -> &Arc<SessionKeyStore> {
        &self.sessions
    }

    pub fn local_user(&self) -> Option<&str> {
        self.local_user.as_deref()
    }

    fn key_pair(&self) -> Result<IdentityKeyPair, ProtocolError> {
        self.identity.key_pair().ok_or(ProtocolError::NotInitialized)
    }

    /// Encrypt `plaintext` for `peer_id`, reusing or creating the outbound
    /// session key for that peer.
    pub fn encrypt_for_peer(
        &self,
        plaintext: &str,
        peer_id: &str,
        peer_public_key: &str,
    ) -> Result<SecureEnvelope, ProtocolError> {
        let key_pair = self.key_pair()?;
        let peer_key = codec::decode_public_key(peer_public_key)?;

        let session_key = self.sessions.get_or_create(
            peer_id,
            KeyDirection::Outbound,
            crypto::generate_symmetric_key,
        );

        let payload = crypto::encrypt(plaintext.as_bytes(), &session_key)?;
        let wrapped = crypto::wrap_key(&session_key, &peer_key)?;
        let signature = crypto::sign(plaintext.as_bytes(), key_pair.private_key());

        debug!("encrypted {} bytes for {}", plaintext.len(), peer_id);
        Ok(SecureEnvelope {
            encrypted_content: EncryptedContent::from_payload(&payload),
            wrapped_session_key: codec::encode_bytes(&wrapped),
            signature: codec::encode_bytes(&signature),
            sender_public_key: codec::encode_public_key(key_pair.public_key())?,
            timestamp: Utc::now().timestamp_millis(),
            sender: self.local_user.clone(),
        })
    }

    /// Open a secure message addressed to this device.
    ///
    /// The session key is cached as the sender's inbound key only after the
    /// signature over the decrypted plaintext verifies.
    pub fn decrypt_envelope(
        &self,
        envelope: &SecureEnvelope,
    ) -> Result<DecryptedMessage, ProtocolError> {
        let key_pair = self.key_pair()?;

        let sender_key = codec::decode_public_key(&envelope.sender_public_key)?;
        let wrapped = codec::decode_bytes(&envelope.wrapped_session_key)?;
        let payload = envelope.encrypted_content.to_payload()?;
        let signature = codec::decode_bytes(&envelope.signature)?;

        let session_key = crypto::unwrap_key(&wrapped, key_pair.private_key())?;
        let plaintext = crypto::decrypt(&payload, &session_key)?;

        if !crypto::verify(&plaintext, &signature, &sender_key) {
            warn!(
                "rejecting secure message from {}: bad signature",
                envelope.sender.as_deref().unwrap_or("<unknown>")
            );
            return Err(ProtocolError::SignatureInvalid);
        }

        let content = String::from_utf8(plaintext).map_err(|_| ProtocolError::InvalidUtf8)?;

        match envelope.sender.as_deref() {
            Some(sender) => self.sessions.put(sender, KeyDirection::Inbound, session_key),
            None => debug!("secure message without sender; session key not cached"),
        }

        Ok(DecryptedMessage {
            content,
            sender: envelope.sender.clone(),
            authentic: true,
        })
    }

    /// Build a key exchange delivering a fresh session key to the holder of
    /// `peer_public_key`. The key is not retained locally.
    pub fn create_key_exchange(
        &self,
        peer_public_key: &str,
    ) -> Result<KeyExchangeEnvelope, ProtocolError> {
        let (envelope, _) = self.build_key_exchange(peer_public_key)?;
        Ok(envelope)
    }

    /// Like [`create_key_exchange`](Self::create_key_exchange), and installs
    /// the fresh key as the outbound key for `peer_id` so later secure
    /// messages to that peer use it.
    pub fn create_key_exchange_for(
        &self,
        peer_id: &str,
        peer_public_key: &str,
    ) -> Result<KeyExchangeEnvelope, ProtocolError> {
        let (envelope, session_key) = self.build_key_exchange(peer_public_key)?;
        self.sessions.put(peer_id, KeyDirection::Outbound, session_key);
        Ok(envelope)
    }

    fn build_key_exchange(
        &self,
        peer_public_key: &str,
    ) -> Result<(KeyExchangeEnvelope, SymmetricKey), ProtocolError> {
        let key_pair = self.key_pair()?;
        let peer_key: PublicKey = codec::decode_public_key(peer_public_key)?;

        let session_key = crypto::generate_symmetric_key();
        let wrapped = crypto::wrap_key(&session_key, &peer_key)?;
        let encoded_key = codec::encode_symmetric_key(&session_key);
        let signature = crypto::sign(encoded_key.as_bytes(), key_pair.private_key());

        let envelope = KeyExchangeEnvelope {
            sender_public_key: codec::encode_public_key(key_pair.public_key())?,
            wrapped_session_key: codec::encode_bytes(&wrapped),
            signature: codec::encode_bytes(&signature),
            timestamp: Utc::now().timestamp_millis(),
            sender: self.local_user.clone(),
        };
        Ok((envelope, session_key))
    }

    /// Accept a key exchange. Returns the sender whose inbound key was
    /// installed. On any failure the session store is left untouched.
    pub fn try_process_key_exchange(
        &self,
        envelope: &KeyExchangeEnvelope,
    ) -> Result<String, ProtocolError> {
        let key_pair = self.key_pair()?;
        let sender = envelope.sender.clone().ok_or(ProtocolError::MissingSender)?;

        let wrapped = codec::decode_bytes(&envelope.wrapped_session_key)?;
        let sender_key = codec::decode_public_key(&envelope.sender_public_key)?;
        let signature = codec::decode_bytes(&envelope.signature)?;

        let session_key = crypto::unwrap_key(&wrapped, key_pair.private_key())?;
        let encoded_key = codec::encode_symmetric_key(&session_key);
        if !crypto::verify(encoded_key.as_bytes(), &signature, &sender_key) {
            return Err(ProtocolError::SignatureInvalid);
        }

        self.sessions.put(&sender, KeyDirection::Inbound, session_key);
        info!("established inbound session key for {}", sender);
        Ok(sender)
    }

    /// Accept a key exchange, reporting only success.
    pub fn process_key_exchange(&self, envelope: &KeyExchangeEnvelope) -> bool {
        match self.try_process_key_exchange(envelope) {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    "key exchange from {} rejected: {}",
                    envelope.sender.as_deref().unwrap_or("<unknown>"),
                    err
                );
                false
            }
        }
    }

    /// Forget every session key (logout).
    pub fn clear_sessions(&self) {
        self.sessions.clear();
    }
}
