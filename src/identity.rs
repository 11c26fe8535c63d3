//! Device identity lifecycle.
//!
//! The identity key pair is generated once per installation and persisted in
//! the durable store as encoded strings. [`IdentityManager::initialize`] loads
//! it, or generates and persists a new one when none is stored. A stored pair
//! that fails to decode is treated as absent: the device silently gets a new
//! identity, and peers holding the old public key can no longer verify it
//! until a fresh key exchange.

use std::sync::{PoisonError, RwLock};

use log::{info, warn};
use thiserror::Error;

use crate::crypto::{codec, CryptoError, IdentityKeyPair, PrivateKey, PublicKey};
use crate::store::{DurableStore, StoreError};

pub const DEFAULT_PRIVATE_KEY_ENTRY: &str = "private_key";
pub const DEFAULT_PUBLIC_KEY_ENTRY: &str = "public_key";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity store failed: {0}")]
    Store(#[from] StoreError),
    #[error("identity could not be encoded: {0}")]
    Crypto(#[from] CryptoError),
}

/// Owns the long-lived identity key pair.
pub struct IdentityManager<S> {
    store: S,
    private_entry: String,
    public_entry: String,
    key_pair: RwLock<Option<IdentityKeyPair>>,
}

impl<S: DurableStore> IdentityManager<S> {
    /// Manager using the default store entry names.
    pub fn new(store: S) -> Self {
        Self::with_entries(store, DEFAULT_PRIVATE_KEY_ENTRY, DEFAULT_PUBLIC_KEY_ENTRY)
    }

    /// Manager persisting the key halves under custom entry names.
    pub fn with_entries(
        store: S,
        private_entry: impl Into<String>,
        public_entry: impl Into<String>,
    ) -> Self {
        Self {
            store,
            private_entry: private_entry.into(),
            public_entry: public_entry.into(),
            key_pair: RwLock::new(None),
        }
    }

    /// Load the persisted identity, or generate and persist a new one.
    ///
    /// When this returns `Ok`, the key pair is durable and available.
    /// Concurrent callers are serialized, so all of them end up holding the
    /// pair that is in the store.
    pub fn initialize(&self) -> Result<(), IdentityError> {
        let mut slot = self.key_pair.write().unwrap_or_else(PoisonError::into_inner);
        let key_pair = match self.load()? {
            Some(key_pair) => {
                info!("loaded identity key pair");
                key_pair
            }
            None => self.generate_and_store()?,
        };

        *slot = Some(key_pair);
        Ok(())
    }

    fn load(&self) -> Result<Option<IdentityKeyPair>, IdentityError> {
        let private = self.store.get(&self.private_entry)?;
        let public = self.store.get(&self.public_entry)?;

        let (private, public) = match (private, public) {
            (Some(private), Some(public)) => (private, public),
            (None, None) => return Ok(None),
            _ => {
                warn!("identity store holds only one key half; regenerating identity");
                return Ok(None);
            }
        };

        let decoded = codec::decode_private_key(&private)
            .and_then(|private| Ok((private, codec::decode_public_key(&public)?)));
        match decoded {
            Ok((private, public)) => match IdentityKeyPair::from_parts(public, private) {
                Some(key_pair) => Ok(Some(key_pair)),
                None => {
                    warn!("stored identity halves do not match; regenerating identity");
                    Ok(None)
                }
            },
            Err(err) => {
                warn!("stored identity is corrupt ({}); regenerating identity", err);
                Ok(None)
            }
        }
    }

    fn generate_and_store(&self) -> Result<IdentityKeyPair, IdentityError> {
        let key_pair = IdentityKeyPair::generate();
        self.store.set(
            &self.private_entry,
            &codec::encode_private_key(key_pair.private_key())?,
        )?;
        self.store.set(
            &self.public_entry,
            &codec::encode_public_key(key_pair.public_key())?,
        )?;
        info!("generated new identity key pair");
        Ok(key_pair)
    }

    pub fn is_initialized(&self) -> bool {
        self.key_pair
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The identity key pair, once initialized.
    pub fn key_pair(&self) -> Option<IdentityKeyPair> {
        self.key_pair
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        self.key_pair().map(|kp| *kp.public_key())
    }

    pub fn private_key(&self) -> Option<PrivateKey> {
        self.key_pair().map(|kp| kp.private_key().clone())
    }

    /// Encoded public key for sharing with peers.
    pub fn encoded_public_key(&self) -> Option<String> {
        self.public_key()
            .and_then(|key| codec::encode_public_key(&key).ok())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreResult};
    use std::sync::Arc;
    use std::thread;

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl DurableStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn remove(&self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_accessors_empty_before_initialize() {
        let identity = IdentityManager::new(MemoryStore::new());
        assert!(!identity.is_initialized());
        assert!(identity.public_key().is_none());
        assert!(identity.private_key().is_none());
        assert!(identity.encoded_public_key().is_none());
    }

    #[test]
    fn test_first_run_generates_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let identity = IdentityManager::new(Arc::clone(&store));
        identity.initialize().unwrap();

        assert!(identity.is_initialized());
        let stored_public = store.get(DEFAULT_PUBLIC_KEY_ENTRY).unwrap().unwrap();
        assert_eq!(identity.encoded_public_key().unwrap(), stored_public);
        assert!(store.get(DEFAULT_PRIVATE_KEY_ENTRY).unwrap().is_some());
    }

    #[test]
    fn test_reinitialize_loads_same_identity() {
        let store = Arc::new(MemoryStore::new());

        let first = IdentityManager::new(Arc::clone(&store));
        first.initialize().unwrap();
        let public = first.public_key().unwrap();

        let second = IdentityManager::new(Arc::clone(&store));
        second.initialize().unwrap();
        assert_eq!(second.public_key().unwrap(), public);
        assert_eq!(second.private_key(), first.private_key());
    }

    #[test]
    fn test_corrupt_identity_is_regenerated() {
        let store = Arc::new(MemoryStore::new());
        store.set(DEFAULT_PRIVATE_KEY_ENTRY, "garbage").unwrap();
        store.set(DEFAULT_PUBLIC_KEY_ENTRY, "also garbage").unwrap();

        let identity = IdentityManager::new(Arc::clone(&store));
        identity.initialize().unwrap();

        let stored_private = store.get(DEFAULT_PRIVATE_KEY_ENTRY).unwrap().unwrap();
        assert_ne!(stored_private, "garbage");
        assert!(codec::decode_private_key(&stored_private).is_ok());
        assert_eq!(
            identity.encoded_public_key(),
            store.get(DEFAULT_PUBLIC_KEY_ENTRY).unwrap()
        );
    }

    #[test]
    fn test_mismatched_halves_are_regenerated() {
        let store = Arc::new(MemoryStore::new());
        let a = IdentityKeyPair::generate();
        let b = IdentityKeyPair::generate();
        store
            .set(DEFAULT_PRIVATE_KEY_ENTRY, &codec::encode_private_key(a.private_key()).unwrap())
            .unwrap();
        store
            .set(DEFAULT_PUBLIC_KEY_ENTRY, &codec::encode_public_key(b.public_key()).unwrap())
            .unwrap();

        let identity = IdentityManager::new(Arc::clone(&store));
        identity.initialize().unwrap();

        let kp = identity.key_pair().unwrap();
        assert_ne!(kp.public_key(), a.public_key());
        assert_ne!(kp.public_key(), b.public_key());
        assert_eq!(kp.private_key().public_key(), *kp.public_key());
    }

    #[test]
    fn test_partial_identity_is_regenerated() {
        let store = Arc::new(MemoryStore::new());
        let a = IdentityKeyPair::generate();
        store
            .set(DEFAULT_PUBLIC_KEY_ENTRY, &codec::encode_public_key(a.public_key()).unwrap())
            .unwrap();

        let identity = IdentityManager::new(Arc::clone(&store));
        identity.initialize().unwrap();
        assert_ne!(identity.public_key().unwrap(), *a.public_key());
        assert!(store.get(DEFAULT_PRIVATE_KEY_ENTRY).unwrap().is_some());
    }

    #[test]
    fn test_store_failure_is_reported() {
        let identity = IdentityManager::new(ReadOnlyStore);
        assert!(matches!(identity.initialize(), Err(IdentityError::Store(_))));
        assert!(!identity.is_initialized());
        assert!(identity.public_key().is_none());
    }

    #[test]
    fn test_concurrent_initialize_agrees_with_store() {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(IdentityManager::new(Arc::clone(&store)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let identity = Arc::clone(&identity);
                thread::spawn(move || identity.initialize().unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            identity.encoded_public_key(),
            store.get(DEFAULT_PUBLIC_KEY_ENTRY).unwrap()
        );
    }

    #[test]
    fn test_custom_entries() {
        let store = Arc::new(MemoryStore::new());
        let identity = IdentityManager::with_entries(Arc::clone(&store), "id.priv", "id.pub");
        identity.initialize().unwrap();

        assert!(store.get("id.priv").unwrap().is_some());
        assert!(store.get("id.pub").unwrap().is_some());
        assert!(store.get(DEFAULT_PUBLIC_KEY_ENTRY).unwrap().is_none());
    }
}
