use std::collections::BTreeMap;

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    config::CipherConfig,
    crypto::codec,
    identity::IdentityError,
    protocol::{ChatEvent, Dispatcher, Frame, FrameError, PlainEnvelope, SecureMessenger},
    store::DurableStore,
    transport::{Transport, TransportError},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("identity is not initialized; call `initialize` first")]
    NotInitialized,
    #[error("failed to initialize identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("failed to encode frame: {0}")]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Known users and their encoded public keys, as served by the user
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerDirectory {
    peers: BTreeMap<String, String>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a peer. Returns the previous key, if any.
    pub fn insert(
        &mut self,
        username: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Option<String> {
        self.peers.insert(username.into(), public_key.into())
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.peers.get(username).map(String::as_str)
    }

    pub fn remove(&mut self, username: &str) -> Option<String> {
        self.peers.remove(username)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.peers.iter().map(|(u, k)| (u.as_str(), k.as_str()))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Chat session over a [`Transport`]: sends plain or secure frames to the
/// peer directory and turns inbound frames into [`ChatEvent`]s.
pub struct ChatClient<S, T> {
    config: CipherConfig,
    messenger: SecureMessenger<S>,
    transport: T,
    peers: PeerDirectory,
}

impl<S: DurableStore, T: Transport> ChatClient<S, T> {
    /// The configured username wins; without one, the messenger's local user
    /// is adopted so every outgoing frame names the same sender.
    pub fn new(mut config: CipherConfig, messenger: SecureMessenger<S>, transport: T) -> Self {
        let messenger = match config.username.clone() {
            Some(user) => messenger.with_local_user(user),
            None => {
                config.username = messenger.local_user().map(str::to_string);
                messenger
            }
        };
        Self {
            config,
            messenger,
            transport,
            peers: PeerDirectory::new(),
        }
    }

    /// Load or create the identity key pair.
    pub fn initialize(&self) -> Result<(), ClientError> {
        self.messenger.initialize()?;
        Ok(())
    }

    pub fn config(&self) -> &CipherConfig {
        &self.config
    }

    pub fn messenger(&self) -> &SecureMessenger<S> {
        &self.messenger
    }

    pub fn peers(&self) -> &PeerDirectory {
        &self.peers
    }

    pub fn peers_mut(&mut self) -> &mut PeerDirectory {
        &mut self.peers
    }

    pub fn my_public_key(&self) -> Option<String> {
        self.messenger.identity().encoded_public_key()
    }

    pub fn encryption_enabled(&self) -> bool {
        self.config.encryption_enabled
    }

    /// Turn encryption on or off. Turning it on sends a key exchange to every
    /// peer in the directory; the number of exchanges sent is returned.
    pub async fn set_encryption(&mut self, enabled: bool) -> Result<usize, ClientError> {
        self.config.encryption_enabled = enabled;
        if !enabled {
            info!("encryption disabled");
            return Ok(0);
        }
        if !self.messenger.identity().is_initialized() {
            self.config.encryption_enabled = false;
            return Err(ClientError::NotInitialized);
        }

        let mut sent = 0;
        for (peer, public_key) in self.remote_peers() {
            match self.messenger.create_key_exchange_for(&peer, &public_key) {
                Ok(envelope) => {
                    self.transport.send(Frame::from(envelope).to_json()?).await?;
                    sent += 1;
                }
                Err(err) => warn!("skipping key exchange with {}: {}", peer, err),
            }
        }
        info!("encryption enabled; sent {} key exchanges", sent);
        Ok(sent)
    }

    /// Flip encryption and return the new state.
    pub async fn toggle_encryption(&mut self) -> Result<bool, ClientError> {
        let enabled = !self.config.encryption_enabled;
        self.set_encryption(enabled).await?;
        Ok(enabled)
    }

    /// Send a chat message and return the local echo. Blank messages are
    /// ignored.
    pub async fn send(&self, content: &str) -> Result<Option<ChatEvent>, ClientError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        let sender = self.config.username.clone();

        if !self.config.encryption_enabled {
            let frame = Frame::from(PlainEnvelope {
                content: content.to_string(),
                sender: sender.clone(),
            });
            self.transport.send(frame.to_json()?).await?;
            return Ok(Some(ChatEvent::Text {
                sender,
                content: content.to_string(),
            }));
        }

        if !self.messenger.identity().is_initialized() {
            return Err(ClientError::NotInitialized);
        }
        for (peer, public_key) in self.remote_peers() {
            match self.messenger.encrypt_for_peer(content, &peer, &public_key) {
                Ok(envelope) => {
                    self.transport.send(Frame::from(envelope).to_json()?).await?;
                    debug!("sent secure message to {}", peer);
                }
                Err(err) => warn!("could not encrypt for {}: {}", peer, err),
            }
        }
        Ok(Some(ChatEvent::Secure {
            sender,
            content: content.to_string(),
        }))
    }

    /// Wait for the next inbound frame that produces an event. `None` once the
    /// transport is closed.
    ///
    /// Secure frames and key exchanges claiming a sender from the directory
    /// must carry that sender's directory key; otherwise they are rejected
    /// before the messenger sees them.
    pub async fn next_event(&self) -> Option<ChatEvent> {
        let dispatcher = Dispatcher::new(&self.messenger);
        loop {
            let raw = self.transport.recv().await?;
            let frame = match Frame::parse(&raw) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("dropping malformed frame: {}", err);
                    continue;
                }
            };
            if let Some(rejected) = self.reject_impersonation(&frame) {
                return Some(rejected);
            }
            return Some(dispatcher.handle_frame(frame));
        }
    }

    fn reject_impersonation(&self, frame: &Frame) -> Option<ChatEvent> {
        let (sender, claimed_key) = match frame {
            Frame::Secure(env) => (env.sender.as_deref()?, env.sender_public_key.as_str()),
            Frame::KeyExchange(env) => (env.sender.as_deref()?, env.sender_public_key.as_str()),
            Frame::Text(_) => return None,
        };
        let known_key = self.peers.get(sender)?;
        if same_public_key(known_key, claimed_key) {
            return None;
        }

        warn!("{} sent a frame under a key that is not in the directory", sender);
        let sender = Some(sender.to_string());
        Some(match frame {
            Frame::KeyExchange(_) => ChatEvent::KeyExchange {
                sender,
                established: false,
            },
            _ => ChatEvent::DecryptFailed { sender },
        })
    }

    /// Forget all session keys and fall back to plain text.
    pub fn logout(&mut self) {
        self.messenger.clear_sessions();
        self.config.encryption_enabled = false;
        info!("logged out; session keys cleared");
    }

    fn remote_peers(&self) -> Vec<(String, String)> {
        let me = self.config.username.as_deref();
        self.peers
            .iter()
            .filter(|(user, _)| Some(*user) != me)
            .map(|(user, key)| (user.to_string(), key.to_string()))
            .collect()
    }
}

// Decoded comparison, so two encodings of one key still match.
fn same_public_key(a: &str, b: &str) -> bool {
    match (codec::decode_public_key(a), codec::decode_public_key(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
