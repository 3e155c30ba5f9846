//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: opens one long-lived bidirectional text connection to the
//!   feed endpoint and hands back a [`TransportLink`].
//!
//! The feed client is the only caller. It owns the connect timeout, so an
//! adapter's `open` may take as long as the underlying handshake takes.

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

/// Normal closure close code.
pub const CLOSE_NORMAL: u16 = 1000;

/// Abnormal closure close code (no close frame was received).
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Frame written by the client to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// One encoded JSON envelope.
    Text(String),
    /// Close the connection with a code and reason.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Event read by the client from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame.
    Frame(String),
    /// The peer closed the connection.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The connection failed without a close handshake.
    Error(String),
}

/// An open connection as seen by the client.
///
/// Dropping `outbound` or sending [`OutboundFrame::Close`] tells the adapter
/// to shut the connection down. The adapter ends `inbound` once the
/// connection is gone.
#[derive(Debug)]
pub struct TransportLink {
    /// Frames to write, in order.
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    /// Frames and lifecycle events read, in order.
    pub inbound: mpsc::Receiver<TransportEvent>,
}

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Endpoint URL could not be used.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection attempt was refused or failed during the handshake.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// Transport adapter has shut down.
    #[error("transport unavailable")]
    Unavailable,
}

/// Driven port for the feed connection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn open(&self, endpoint: &Url) -> Result<TransportLink, TransportError>;
}
