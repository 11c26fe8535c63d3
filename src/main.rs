use std::{path::PathBuf, sync::Arc};

use ciphertalk::{
    crypto, ChannelTransport, ChatClient, ChatEvent, CipherConfig, Dispatcher, FileStore,
    IdentityManager, MemoryStore, SecureMessenger, SessionKeyStore,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Command-line front end for the CipherTalk encryption core.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Optional JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the JSON settings file holding the identity key pair.
    #[arg(long)]
    settings: Option<String>,

    /// Username written into outgoing frames.
    #[arg(long)]
    user: Option<String>,

    /// Choose a command to run.
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print this device's public key and fingerprint.
    Identity,
    /// Print a KEY_EXCHANGE frame for a peer.
    KeyExchange {
        #[arg(long)]
        peer_key: String,
    },
    /// Print a SECURE frame carrying a message for a peer.
    Encrypt {
        #[arg(long)]
        to: String,
        #[arg(long)]
        peer_key: String,
        message: String,
    },
    /// Dispatch a received frame and print the resulting event.
    Receive { frame: String },
    /// Run a two-party conversation over an in-process transport.
    Demo,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => CipherConfig::load(path)?,
        None => CipherConfig::default(),
    };
    if let Some(settings) = cli.settings {
        config = config.with_settings_path(settings);
    }
    if let Some(user) = cli.user {
        config = config.with_username(user);
    }

    if let Commands::Demo = cli.command {
        return run_demo().await;
    }

    let messenger = open_messenger(&config)?;

    match cli.command {
        Commands::Identity => {
            let public_key = messenger
                .identity()
                .public_key()
                .ok_or("identity unavailable after initialize")?;
            println!("Public key:  {}", crypto::codec::encode_public_key(&public_key)?);
            println!("Fingerprint: {}", crypto::fingerprint(&public_key)?);
        }
        Commands::KeyExchange { peer_key } => {
            let envelope = messenger.create_key_exchange(&peer_key)?;
            println!("{}", ciphertalk::Frame::from(envelope).to_json()?);
        }
        Commands::Encrypt {
            to,
            peer_key,
            message,
        } => {
            let envelope = messenger.encrypt_for_peer(&message, &to, &peer_key)?;
            println!("{}", ciphertalk::Frame::from(envelope).to_json()?);
        }
        Commands::Receive { frame } => match Dispatcher::new(&messenger).handle(&frame) {
            Some(event) => print_event(&event),
            None => eprintln!("Frame is malformed and was dropped."),
        },
        Commands::Demo => {}
    }

    Ok(())
}

fn open_messenger(
    config: &CipherConfig,
) -> Result<SecureMessenger<FileStore>, Box<dyn std::error::Error>> {
    let store = FileStore::open(&config.settings_path)?;
    let identity = IdentityManager::with_entries(
        store,
        config.private_key_entry.clone(),
        config.public_key_entry.clone(),
    );
    let mut messenger = SecureMessenger::new(identity, Arc::new(SessionKeyStore::new()));
    if let Some(user) = &config.username {
        messenger = messenger.with_local_user(user.clone());
    }
    messenger.initialize()?;
    Ok(messenger)
}

fn demo_client(
    user: &str,
    transport: ChannelTransport,
) -> Result<ChatClient<MemoryStore, ChannelTransport>, Box<dyn std::error::Error>> {
    let messenger = SecureMessenger::new(
        IdentityManager::new(MemoryStore::new()),
        Arc::new(SessionKeyStore::new()),
    )
    .with_local_user(user);
    let client = ChatClient::new(CipherConfig::default().with_username(user), messenger, transport);
    client.initialize()?;
    Ok(client)
}

async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let (a, b) = ChannelTransport::pair();
    let mut alice = demo_client("alice", a)?;
    let mut bob = demo_client("bob", b)?;

    let alice_key = alice.my_public_key().ok_or("alice has no identity")?;
    let bob_key = bob.my_public_key().ok_or("bob has no identity")?;
    for client in [&mut alice, &mut bob] {
        client.peers_mut().insert("alice", alice_key.clone());
        client.peers_mut().insert("bob", bob_key.clone());
    }

    if let Some(echo) = alice.send("hi bob, this one is in the clear").await? {
        print_event(&echo);
    }
    print_received("bob", bob.next_event().await);

    alice.set_encryption(true).await?;
    print_received("bob", bob.next_event().await);

    if let Some(echo) = alice.send("and this one is end-to-end encrypted").await? {
        print_event(&echo);
    }
    print_received("bob", bob.next_event().await);

    bob.set_encryption(true).await?;
    print_received("alice", alice.next_event().await);
    if let Some(echo) = bob.send("got it, replying securely").await? {
        print_event(&echo);
    }
    print_received("alice", alice.next_event().await);

    alice.logout();
    println!("alice logged out; encryption enabled: {}", alice.encryption_enabled());
    Ok(())
}

fn print_received(user: &str, event: Option<ChatEvent>) {
    match event {
        Some(event) => {
            print!("{user} <- ");
            print_event(&event);
        }
        None => println!("{user}: connection closed"),
    }
}

fn print_event(event: &ChatEvent) {
    println!(
        "[{}] {}: {}",
        event.kind().as_str(),
        event.sender().unwrap_or("?"),
        event.display_text()
    );
}
