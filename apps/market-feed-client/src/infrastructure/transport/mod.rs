//! Transport Adapters
//!
//! Implementations of the [`Transport`](crate::application::ports::Transport)
//! port.
//!
//! - `websocket`: tokio-tungstenite client for `ws://` and `wss://` endpoints
//! - `channel`: in-process transport driven by a [`ChannelPeer`], for tests
//!   and embedding

/// In-process channel transport.
pub mod channel;

/// WebSocket transport.
pub mod websocket;

pub use channel::{ChannelPeer, ChannelTransport, ConnectMode, PeerConnection};
pub use websocket::WebSocketTransport;

/// Inbound buffer between an adapter and the client.
pub const INBOUND_BUFFER: usize = 1024;
