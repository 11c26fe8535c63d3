//! Inbound frame dispatch.
//!
//! Raw transport text is decoded once into a [`Frame`] and routed to the
//! messenger. Malformed frames are logged and dropped so the receive loop
//! keeps running; frames that fail to decrypt still produce an event so the
//! user sees that a message existed.

use futures::{future, Stream, StreamExt};
use log::warn;

use crate::protocol::envelope::Frame;
use crate::protocol::messenger::SecureMessenger;
use crate::store::DurableStore;

pub const DECRYPT_FAILED_TEXT: &str = "[Failed to decrypt message]";
pub const KEY_EXCHANGE_OK_TEXT: &str = "[Secure connection established]";
pub const KEY_EXCHANGE_FAILED_TEXT: &str = "[Key exchange failed]";

/// Display category of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Text,
    Error,
    System,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Text => "TEXT",
            EventKind::Error => "ERROR",
            EventKind::System => "SYSTEM",
        }
    }
}

/// What the chat layer should show for an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Plain, unauthenticated text.
    Text { sender: Option<String>, content: String },
    /// Decrypted and signature-verified text.
    Secure { sender: Option<String>, content: String },
    /// A secure message that could not be opened or authenticated.
    DecryptFailed { sender: Option<String> },
    /// Outcome of an inbound key exchange.
    KeyExchange { sender: Option<String>, established: bool },
}

impl ChatEvent {
    pub fn sender(&self) -> Option<&str> {
        match self {
            ChatEvent::Text { sender, .. }
            | ChatEvent::Secure { sender, .. }
            | ChatEvent::DecryptFailed { sender }
            | ChatEvent::KeyExchange { sender, .. } => sender.as_deref(),
        }
    }

    pub fn display_text(&self) -> &str {
        match self {
            ChatEvent::Text { content, .. } | ChatEvent::Secure { content, .. } => content,
            ChatEvent::DecryptFailed { .. } => DECRYPT_FAILED_TEXT,
            ChatEvent::KeyExchange { established: true, .. } => KEY_EXCHANGE_OK_TEXT,
            ChatEvent::KeyExchange { established: false, .. } => KEY_EXCHANGE_FAILED_TEXT,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ChatEvent::Text { .. } | ChatEvent::Secure { .. } => EventKind::Text,
            ChatEvent::DecryptFailed { .. } => EventKind::Error,
            ChatEvent::KeyExchange { .. } => EventKind::System,
        }
    }
}

/// Routes decoded frames to a [`SecureMessenger`].
pub struct Dispatcher<'a, S> {
    messenger: &'a SecureMessenger<S>,
}

impl<'a, S: DurableStore> Dispatcher<'a, S> {
    pub fn new(messenger: &'a SecureMessenger<S>) -> Self {
        Self { messenger }
    }

    /// Handle one raw frame. `None` means the frame was malformed and dropped.
    pub fn handle(&self, raw: &str) -> Option<ChatEvent> {
        match Frame::parse(raw) {
            Ok(frame) => Some(self.handle_frame(frame)),
            Err(err) => {
                warn!("dropping malformed frame: {}", err);
                None
            }
        }
    }

    /// Handle an already decoded frame.
    pub fn handle_frame(&self, frame: Frame) -> ChatEvent {
        match frame {
            Frame::Text(env) => ChatEvent::Text {
                sender: env.sender,
                content: env.content,
            },
            Frame::Secure(env) => match self.messenger.decrypt_envelope(&env) {
                Ok(msg) => ChatEvent::Secure {
                    sender: msg.sender,
                    content: msg.content,
                },
                Err(err) => {
                    warn!(
                        "secure message from {} could not be opened: {}",
                        env.sender.as_deref().unwrap_or("<unknown>"),
                        err
                    );
                    ChatEvent::DecryptFailed { sender: env.sender }
                }
            },
            Frame::KeyExchange(env) => {
                let established = self.messenger.process_key_exchange(&env);
                ChatEvent::KeyExchange {
                    sender: env.sender,
                    established,
                }
            }
        }
    }

    /// Adapt a stream of raw frames into a stream of chat events, skipping
    /// malformed frames.
    pub fn events<T>(&'a self, frames: T) -> impl Stream<Item = ChatEvent> + 'a
    where
        T: Stream<Item = String> + 'a,
    {
        frames.filter_map(move |raw| future::ready(self.handle(&raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityManager;
    use crate::protocol::envelope::PlainEnvelope;
    use crate::store::{KeyDirection, MemoryStore, SessionKeyStore};
    use std::sync::Arc;

    fn messenger(user: &str) -> SecureMessenger<MemoryStore> {
        let m = SecureMessenger::new(
            IdentityManager::new(MemoryStore::new()),
            Arc::new(SessionKeyStore::new()),
        )
        .with_local_user(user);
        m.initialize().unwrap();
        m
    }

    fn public_of(m: &SecureMessenger<MemoryStore>) -> String {
        m.identity().encoded_public_key().unwrap()
    }

    #[test]
    fn test_plain_text() {
        let bob = messenger("bob");
        let event = Dispatcher::new(&bob)
            .handle(r#"{"content":"hey","sender":"alice","type":"TEXT"}"#)
            .unwrap();
        assert_eq!(
            event,
            ChatEvent::Text {
                sender: Some("alice".into()),
                content: "hey".into()
            }
        );
        assert_eq!(event.kind(), EventKind::Text);
    }

    #[test]
    fn test_secure_frame() {
        let alice = messenger("alice");
        let bob = messenger("bob");
        let raw = Frame::from(alice.encrypt_for_peer("secret", "bob", &public_of(&bob)).unwrap())
            .to_json()
            .unwrap();

        let event = Dispatcher::new(&bob).handle(&raw).unwrap();
        assert_eq!(event.display_text(), "secret");
        assert_eq!(event.sender(), Some("alice"));
        assert!(matches!(event, ChatEvent::Secure { .. }));
    }

    #[test]
    fn test_undecryptable_frame_yields_placeholder() {
        let alice = messenger("alice");
        let bob = messenger("bob");
        let carol = messenger("carol");
        let raw = Frame::from(alice.encrypt_for_peer("not for bob", "carol", &public_of(&carol)).unwrap())
            .to_json()
            .unwrap();

        let event = Dispatcher::new(&bob).handle(&raw).unwrap();
        assert_eq!(event, ChatEvent::DecryptFailed { sender: Some("alice".into()) });
        assert_eq!(event.display_text(), DECRYPT_FAILED_TEXT);
        assert_eq!(event.kind().as_str(), "ERROR");
    }

    #[test]
    fn test_key_exchange_frame() {
        let alice = messenger("alice");
        let bob = messenger("bob");
        let raw = Frame::from(alice.create_key_exchange(&public_of(&bob)).unwrap())
            .to_json()
            .unwrap();

        let event = Dispatcher::new(&bob).handle(&raw).unwrap();
        assert_eq!(event.display_text(), KEY_EXCHANGE_OK_TEXT);
        assert_eq!(event.kind(), EventKind::System);
        assert!(bob.sessions().get("alice", KeyDirection::Inbound).is_some());

        let raw = Frame::from(alice.create_key_exchange(&public_of(&alice)).unwrap())
            .to_json()
            .unwrap();
        let event = Dispatcher::new(&bob).handle(&raw).unwrap();
        assert_eq!(event.display_text(), KEY_EXCHANGE_FAILED_TEXT);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let bob = messenger("bob");
        let dispatcher = Dispatcher::new(&bob);
        assert_eq!(dispatcher.handle("garbage"), None);
        assert_eq!(dispatcher.handle(r#"{"type":"SECURE"}"#), None);
        assert_eq!(dispatcher.handle("42"), None);
    }

    #[tokio::test]
    async fn test_event_stream_skips_malformed() {
        let bob = messenger("bob");
        let dispatcher = Dispatcher::new(&bob);

        let plain = Frame::from(PlainEnvelope {
            content: "one".into(),
            sender: None,
        })
        .to_json()
        .unwrap();
        let frames = futures::stream::iter(vec![
            plain.clone(),
            "{broken".to_string(),
            plain,
        ]);

        let events: Vec<ChatEvent> = dispatcher.events(frames).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.display_text() == "one"));
    }
}
