//! Transport seam.
//!
//! The chat client only needs something that moves UTF-8 text frames in both
//! directions. Real deployments plug in a WebSocket; [`ChannelTransport`]
//! connects two clients inside one process.

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
}

/// Bidirectional carrier of opaque text frames.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Queue one frame for delivery.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Next inbound frame, or `None` once the remote side has gone away.
    async fn recv(&self) -> Option<String>;
}

/// In-process transport backed by unbounded tokio channels.
#[derive(Debug)]
pub struct ChannelTransport {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl ChannelTransport {
    /// Two endpoints wired to each other.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self {
                outgoing: a_tx,
                incoming: Mutex::new(b_rx),
            },
            Self {
                outgoing: b_tx,
                incoming: Mutex::new(a_rx),
            },
        )
    }
}

impl Transport for ChannelTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outgoing.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Option<String> {
        self.incoming.lock().await.recv().await
    }
}
