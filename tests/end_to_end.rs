use std::sync::Arc;

use ciphertalk::{
    crypto::{self, codec},
    ChannelTransport, ChatClient, ChatEvent, CipherConfig, Dispatcher, FileStore, Frame,
    IdentityManager, KeyDirection, MemoryStore, ProtocolError, SecureMessenger, SessionKeyStore,
};

fn messenger(user: &str) -> SecureMessenger<MemoryStore> {
    let m = SecureMessenger::new(
        IdentityManager::new(MemoryStore::new()),
        Arc::new(SessionKeyStore::new()),
    )
    .with_local_user(user);
    m.initialize().unwrap();
    m
}

fn public_of<S: ciphertalk::DurableStore>(m: &SecureMessenger<S>) -> String {
    m.identity().encoded_public_key().unwrap()
}

#[test]
fn alice_and_bob_exchange_keys_then_talk() {
    let alice = messenger("alice");
    let bob = messenger("bob");

    let exchange = alice.create_key_exchange_for("bob", &public_of(&bob)).unwrap();
    let raw = Frame::from(exchange).to_json().unwrap();
    assert!(raw.contains(r#""type":"KEY_EXCHANGE""#));
    let Frame::KeyExchange(received) = Frame::parse(&raw).unwrap() else {
        panic!("expected a key exchange frame");
    };
    assert!(bob.process_key_exchange(&received));
    assert_eq!(
        bob.sessions().get("alice", KeyDirection::Inbound),
        alice.sessions().get("bob", KeyDirection::Outbound)
    );

    let raw = Frame::from(alice.encrypt_for_peer("Hello, Bob!", "bob", &public_of(&bob)).unwrap())
        .to_json()
        .unwrap();
    let event = Dispatcher::new(&bob).handle(&raw).unwrap();
    assert_eq!(
        event,
        ChatEvent::Secure {
            sender: Some("alice".into()),
            content: "Hello, Bob!".into()
        }
    );
}

#[test]
fn third_party_cannot_read() {
    let alice = messenger("alice");
    let bob = messenger("bob");
    let eve = messenger("eve");

    let envelope = alice.encrypt_for_peer("for bob only", "bob", &public_of(&bob)).unwrap();
    assert!(matches!(
        eve.decrypt_envelope(&envelope),
        Err(ProtocolError::Crypto(_))
    ));
    assert!(eve.sessions().is_empty());
    assert_eq!(bob.decrypt_envelope(&envelope).unwrap().content, "for bob only");
}

#[test]
fn forged_sender_key_is_rejected() {
    let alice = messenger("alice");
    let bob = messenger("bob");
    let mallory = messenger("mallory");

    let mut envelope = alice.encrypt_for_peer("wire the money", "bob", &public_of(&bob)).unwrap();
    envelope.sender_public_key = public_of(&mallory);

    assert!(matches!(
        bob.decrypt_envelope(&envelope),
        Err(ProtocolError::SignatureInvalid)
    ));
    assert!(bob.sessions().get("alice", KeyDirection::Inbound).is_none());
}

#[test]
fn logout_forgets_sessions() {
    let alice = messenger("alice");
    let bob = messenger("bob");
    alice.encrypt_for_peer("one", "bob", &public_of(&bob)).unwrap();
    assert_eq!(alice.sessions().len(), 1);

    alice.clear_sessions();
    assert!(alice.sessions().is_empty());
    // A fresh session key is created on the next send.
    alice.encrypt_for_peer("two", "bob", &public_of(&bob)).unwrap();
    assert_eq!(alice.sessions().len(), 1);
}

#[test]
fn identity_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let first = {
        let identity = IdentityManager::new(FileStore::open(&path).unwrap());
        identity.initialize().unwrap();
        identity.encoded_public_key().unwrap()
    };
    let identity = IdentityManager::new(FileStore::open(&path).unwrap());
    identity.initialize().unwrap();
    assert_eq!(identity.encoded_public_key().unwrap(), first);

    let pk = codec::decode_public_key(&first).unwrap();
    assert_eq!(crypto::fingerprint(&pk).unwrap().len(), 64);
}

#[test]
fn messages_from_restarted_peer_still_decrypt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bob.json");
    let alice = messenger("alice");

    let bob_key = {
        let bob = SecureMessenger::new(
            IdentityManager::new(FileStore::open(&path).unwrap()),
            Arc::new(SessionKeyStore::new()),
        );
        bob.initialize().unwrap();
        public_of(&bob)
    };
    let envelope = alice.encrypt_for_peer("sent while offline", "bob", &bob_key).unwrap();

    let bob = SecureMessenger::new(
        IdentityManager::new(FileStore::open(&path).unwrap()),
        Arc::new(SessionKeyStore::new()),
    );
    bob.initialize().unwrap();
    assert_eq!(bob.decrypt_envelope(&envelope).unwrap().content, "sent while offline");
}

#[tokio::test]
async fn chat_clients_over_channel_transport() {
    let (a, b) = ChannelTransport::pair();
    let mut alice = ChatClient::new(
        CipherConfig::default().with_username("alice"),
        messenger("alice"),
        a,
    );
    let mut bob = ChatClient::new(
        CipherConfig::default().with_username("bob").with_encryption(true),
        messenger("bob"),
        b,
    );

    let alice_key = alice.my_public_key().unwrap();
    let bob_key = bob.my_public_key().unwrap();
    for client in [&mut alice, &mut bob] {
        client.peers_mut().insert("alice", alice_key.clone());
        client.peers_mut().insert("bob", bob_key.clone());
    }

    alice.send("plain hello").await.unwrap();
    assert_eq!(
        bob.next_event().await.unwrap(),
        ChatEvent::Text {
            sender: Some("alice".into()),
            content: "plain hello".into()
        }
    );

    // Bob starts with encryption on, so his reply is sealed even without a
    // prior key exchange.
    bob.send("sealed reply").await.unwrap();
    assert_eq!(
        alice.next_event().await.unwrap(),
        ChatEvent::Secure {
            sender: Some("bob".into()),
            content: "sealed reply".into()
        }
    );
    assert!(alice
        .messenger()
        .sessions()
        .get("bob", KeyDirection::Inbound)
        .is_some());

    drop(bob);
    assert_eq!(alice.next_event().await, None);
}
