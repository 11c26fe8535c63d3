//! Secure messaging protocol.
//!
//! Wire envelopes, the messenger that builds and opens them, and the
//! dispatcher that routes inbound frames.

pub mod dispatch;
pub mod envelope;
mod messenger;

pub use dispatch::{ChatEvent, Dispatcher, EventKind};
pub use envelope::{
    EncryptedContent, Frame, FrameError, KeyExchangeEnvelope, PlainEnvelope, SecureEnvelope,
};
pub use messenger::{DecryptedMessage, ProtocolError, SecureMessenger};
