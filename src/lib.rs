//! CipherTalk: end-to-end encryption core for a chat client.
//!
//! ## Modules
//!
//! - `crypto` - Key codec and primitives (AES-256-GCM, Ed25519, key wrapping)
//! - `store` - Durable settings stores and the in-memory session key store
//! - `identity` - Long-term identity key pair lifecycle
//! - `protocol` - Wire envelopes, secure messenger and inbound dispatch
//! - `transport` - Frame transport seam
//! - `client` - Chat client tying the above together
//! - `config` - Configuration management

pub mod crypto;
pub mod identity;
pub mod protocol;
pub mod store;
pub mod transport;

mod client;
mod config;

pub use client::{ChatClient, ClientError, PeerDirectory};
pub use config::{CipherConfig, ConfigError};
pub use identity::{IdentityError, IdentityManager};
pub use protocol::{
    ChatEvent, DecryptedMessage, Dispatcher, Frame, KeyExchangeEnvelope, ProtocolError,
    SecureEnvelope, SecureMessenger,
};
pub use store::{DurableStore, FileStore, KeyDirection, MemoryStore, SessionKeyStore};
pub use transport::{ChannelTransport, Transport, TransportError};
