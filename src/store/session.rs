//! In-memory session key store.
//!
//! Keys are held per `(peer, direction)` so that a key this device generated
//! for sending never overwrites a key the peer delivered for receiving.
//! Access is serialized by a mutex; every operation is a single critical
//! section, including [`SessionKeyStore::get_or_create`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::crypto::SymmetricKey;

/// Role a session key plays for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    /// Generated here, used to send to the peer.
    Outbound,
    /// Delivered by the peer through a key exchange or secure message.
    /// Recorded for inspection only: every secure message carries its own
    /// wrapped key, so decryption never reads this slot.
    Inbound,
}

/// Process-lifetime map of session keys. Nothing is persisted.
#[derive(Debug, Default)]
pub struct SessionKeyStore {
    keys: Mutex<HashMap<(String, KeyDirection), SymmetricKey>>,
}

impl SessionKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The map holds no invariants a panicking writer could break halfway.
    fn lock(&self) -> MutexGuard<'_, HashMap<(String, KeyDirection), SymmetricKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current key for `peer` in `direction`.
    pub fn get(&self, peer: &str, direction: KeyDirection) -> Option<SymmetricKey> {
        self.lock().get(&(peer.to_string(), direction)).cloned()
    }

    /// Return the key for `peer` in `direction`, creating it with `factory`
    /// if absent. The factory runs at most once per missing slot.
    pub fn get_or_create<F>(&self, peer: &str, direction: KeyDirection, factory: F) -> SymmetricKey
    where
        F: FnOnce() -> SymmetricKey,
    {
        self.lock()
            .entry((peer.to_string(), direction))
            .or_insert_with(|| {
                debug!("created {:?} session key for {}", direction, peer);
                factory()
            })
            .clone()
    }

    /// Install `key` for `peer` in `direction`, replacing any previous key.
    pub fn put(&self, peer: &str, direction: KeyDirection, key: SymmetricKey) {
        let replaced = self
            .lock()
            .insert((peer.to_string(), direction), key)
            .is_some();
        debug!(
            "stored {:?} session key for {}{}",
            direction,
            peer,
            if replaced { " (replaced)" } else { "" }
        );
    }

    /// Forget both keys for `peer`.
    pub fn remove(&self, peer: &str) {
        let mut keys = self.lock();
        keys.remove(&(peer.to_string(), KeyDirection::Outbound));
        keys.remove(&(peer.to_string(), KeyDirection::Inbound));
    }

    /// Drop every key (logout).
    pub fn clear(&self) {
        let mut keys = self.lock();
        debug!("clearing {} session keys", keys.len());
        keys.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
