//! Storage for CipherTalk.
//!
//! Durable settings (identity keys) go through [`DurableStore`]; session keys
//! live only in the in-memory [`SessionKeyStore`].

mod file;
mod memory;
mod session;
mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use session::{KeyDirection, SessionKeyStore};
pub use traits::{DurableStore, StoreError, StoreResult};
