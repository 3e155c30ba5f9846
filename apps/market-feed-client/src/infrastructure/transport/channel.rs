//! Channel Transport
//!
//! In-process implementation of the transport port. The client side is a
//! [`ChannelTransport`]; the other end is a [`ChannelPeer`] that plays the
//! feed server: it accepts or refuses connection attempts, pushes inbound
//! frames, closes connections with a code, and observes what the client
//! wrote.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use crate::application::ports::{
    OutboundFrame, Transport, TransportError, TransportEvent, TransportLink,
};
use crate::infrastructure::transport::INBOUND_BUFFER;

/// How the transport answers `open`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectMode {
    /// Open succeeds and a [`PeerConnection`] is handed to the peer.
    #[default]
    Accept,
    /// Open fails with the given reason.
    Refuse(String),
    /// Open never completes.
    Hang,
    /// Open succeeds but the server side is dropped at once, like a
    /// connection that dies right after the handshake.
    Discard,
}

#[derive(Debug, Default)]
struct Control {
    mode: ConnectMode,
    attempts: u32,
    endpoints: Vec<Url>,
}

/// Client side of the channel transport.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    control: Arc<Mutex<Control>>,
    accepted: mpsc::UnboundedSender<PeerConnection>,
}

/// Server side of the channel transport.
#[derive(Debug)]
pub struct ChannelPeer {
    control: Arc<Mutex<Control>>,
    accepted: mpsc::UnboundedReceiver<PeerConnection>,
}

impl ChannelTransport {
    /// Create a connected transport and peer pair.
    #[must_use]
    pub fn pair() -> (Self, ChannelPeer) {
        let control = Arc::new(Mutex::new(Control::default()));
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        (
            Self {
                control: Arc::clone(&control),
                accepted: accepted_tx,
            },
            ChannelPeer {
                control,
                accepted: accepted_rx,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn open(&self, endpoint: &Url) -> Result<TransportLink, TransportError> {
        let mode = {
            let mut control = self.control.lock();
            control.attempts += 1;
            control.endpoints.push(endpoint.clone());
            control.mode.clone()
        };

        match mode {
            ConnectMode::Refuse(reason) => Err(TransportError::ConnectFailed(reason)),
            ConnectMode::Hang => std::future::pending().await,
            ConnectMode::Discard => {
                let (outbound_tx, _) = mpsc::unbounded_channel();
                let (_, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
                Ok(TransportLink {
                    outbound: outbound_tx,
                    inbound: inbound_rx,
                })
            }
            ConnectMode::Accept => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

                self.accepted
                    .send(PeerConnection {
                        inbound: inbound_tx,
                        outbound: outbound_rx,
                    })
                    .map_err(|_| TransportError::Unavailable)?;

                Ok(TransportLink {
                    outbound: outbound_tx,
                    inbound: inbound_rx,
                })
            }
        }
    }
}

impl ChannelPeer {
    /// Change how future connection attempts are answered.
    pub fn set_mode(&self, mode: ConnectMode) {
        self.control.lock().mode = mode;
    }

    /// Accept future connection attempts.
    pub fn accept(&self) {
        self.set_mode(ConnectMode::Accept);
    }

    /// Refuse future connection attempts.
    pub fn refuse(&self, reason: impl Into<String>) {
        self.set_mode(ConnectMode::Refuse(reason.into()));
    }

    /// Leave future connection attempts pending.
    pub fn hang(&self) {
        self.set_mode(ConnectMode::Hang);
    }

    /// Number of `open` calls so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.control.lock().attempts
    }

    /// Endpoints passed to `open`, in order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Url> {
        self.control.lock().endpoints.clone()
    }

    /// Wait for the next accepted connection.
    pub async fn next_connection(&mut self) -> Option<PeerConnection> {
        self.accepted.recv().await
    }

    /// Take an accepted connection if one is waiting.
    pub fn try_next_connection(&mut self) -> Option<PeerConnection> {
        self.accepted.try_recv().ok()
    }
}

/// Server side of one accepted connection.
#[derive(Debug)]
pub struct PeerConnection {
    inbound: mpsc::Sender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl PeerConnection {
    /// Push a text frame to the client.
    ///
    /// Returns `false` if the client is no longer reading.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.inbound
            .send(TransportEvent::Frame(text.into()))
            .await
            .is_ok()
    }

    /// Close the connection from the server side.
    pub async fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.inbound
            .send(TransportEvent::Closed {
                code,
                reason: reason.into(),
            })
            .await
            .is_ok()
    }

    /// Fail the connection without a close handshake.
    pub async fn fail(&self, error: impl Into<String>) -> bool {
        self.inbound
            .send(TransportEvent::Error(error.into()))
            .await
            .is_ok()
    }

    /// Wait for the next frame written by the client.
    ///
    /// Returns `None` once the client dropped its side.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.outbound.recv().await
    }

    /// Take every frame written so far without waiting.
    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Take every text frame written so far without waiting.
    pub fn drain_text(&mut self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(text) => Some(text),
                OutboundFrame::Close { .. } => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("ws://feed.test/stream?token=t").unwrap()
    }

    #[tokio::test]
    async fn accept_links_both_sides() {
        let (transport, mut peer) = ChannelTransport::pair();
        let mut link = transport.open(&endpoint()).await.unwrap();
        let mut conn = peer.next_connection().await.unwrap();

        assert!(conn.send_text("hello").await);
        assert_eq!(
            link.inbound.recv().await,
            Some(TransportEvent::Frame("hello".to_string()))
        );

        link.outbound
            .send(OutboundFrame::Text("world".to_string()))
            .unwrap();
        assert_eq!(conn.drain_text(), vec!["world"]);
        assert_eq!(peer.attempts(), 1);
        assert_eq!(peer.endpoints(), vec![endpoint()]);
    }

    #[tokio::test]
    async fn discard_opens_a_dead_link() {
        let (transport, mut peer) = ChannelTransport::pair();
        peer.set_mode(ConnectMode::Discard);

        let mut link = transport.open(&endpoint()).await.unwrap();
        assert!(link.outbound.send(OutboundFrame::Text("lost".to_string())).is_err());
        assert_eq!(link.inbound.recv().await, None);
        assert!(peer.try_next_connection().is_none());
    }

    #[tokio::test]
    async fn refuse_fails_open() {
        let (transport, peer) = ChannelTransport::pair();
        peer.refuse("connection refused");

        let err = transport.open(&endpoint()).await.unwrap_err();
        assert_eq!(err, TransportError::ConnectFailed("connection refused".to_string()));
        assert_eq!(peer.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hang_never_completes() {
        let (transport, peer) = ChannelTransport::pair();
        peer.hang();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            transport.open(&endpoint()),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dropped_client_ends_peer_stream() {
        let (transport, mut peer) = ChannelTransport::pair();
        let link = transport.open(&endpoint()).await.unwrap();
        let mut conn = peer.next_connection().await.unwrap();

        drop(link);
        assert!(conn.recv().await.is_none());
        assert!(!conn.send_text("late").await);
    }
}
