//! Store traits for durable client settings.

use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store contents could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent key-value store for durable settings.
///
/// `set` and `remove` return only after the change is durable, so a caller
/// may rely on it surviving a crash once the call returns.
pub trait DurableStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete the value under `key`, if any.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

impl<T: DurableStore + ?Sized> DurableStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key)
    }
}
