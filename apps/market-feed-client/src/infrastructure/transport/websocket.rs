//! WebSocket Transport
//!
//! Opens the feed endpoint with tokio-tungstenite and pumps frames between
//! the socket and the client's channels on a dedicated task.
//!
//! # Protocol
//!
//! - Text frames are forwarded as-is; binary frames are decoded as UTF-8,
//!   lossily, and left for the codec to accept or reject
//! - Pings are answered with pongs
//! - A close frame ends the pump and is reported with its code and reason

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use url::Url;

use crate::application::ports::{
    CLOSE_ABNORMAL, OutboundFrame, Transport, TransportError, TransportEvent, TransportLink,
};
use crate::infrastructure::transport::INBOUND_BUFFER;

/// Close code reported when the peer sent a close frame without a status.
const CLOSE_NO_STATUS: u16 = 1005;

/// WebSocket implementation of the transport port.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, endpoint: &Url) -> Result<TransportLink, TransportError> {
        match endpoint.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported scheme {other}"
                )));
            }
        }

        tracing::debug!(host = ?endpoint.host_str(), "Opening WebSocket");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        tokio::spawn(pump(ws_stream, outbound_rx, inbound_tx));

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

type FeedSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn pump(
    ws_stream: FeedSocket,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound: mpsc::Sender<TransportEvent>,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(OutboundFrame::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            tracing::warn!(error = %e, "WebSocket write failed");
                            let _ = inbound.send(TransportEvent::Error(e.to_string())).await;
                            return;
                        }
                    }
                    Some(OutboundFrame::Close { code, reason }) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        let _ = write.send(Message::Close(Some(frame))).await;
                        return;
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if inbound.send(TransportEvent::Frame(text.to_string())).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        // Invalid UTF-8 is passed on lossily so the codec rejects and counts it.
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        if inbound.send(TransportEvent::Frame(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or_else(
                            || (CLOSE_NO_STATUS, String::new()),
                            |f| (u16::from(f.code), f.reason.to_string()),
                        );
                        tracing::info!(code, reason = %reason, "Server sent close frame");
                        let _ = inbound.send(TransportEvent::Closed { code, reason }).await;
                        return;
                    }
                    Some(Ok(_)) => {
                        // Pong and raw frames carry nothing for the client
                    }
                    Some(Err(e)) => {
                        let _ = inbound.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                    None => {
                        let _ = inbound
                            .send(TransportEvent::Closed {
                                code: CLOSE_ABNORMAL,
                                reason: "stream ended".to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use crate::domain::connection::ConnectionState;
    use crate::infrastructure::config::FeedClientConfig;
    use crate::infrastructure::feed::{FeedClient, FeedEvent};

    #[tokio::test]
    async fn rejects_non_websocket_scheme() {
        let transport = WebSocketTransport::new();
        let url = Url::parse("https://feed.example.com/stream").unwrap();
        let err = transport.open(&url).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_to_connect() {
        let transport = WebSocketTransport::new();
        // Port 9 (discard) on loopback is closed in test environments.
        let url = Url::parse("ws://127.0.0.1:9/stream").unwrap();
        let err = transport.open(&url).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailed(_)));
    }

    #[tokio::test]
    async fn frames_flow_both_ways_over_loopback() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Text(r#"{"type":"HEARTBEAT"}"#.into()))
                .await
                .unwrap();
            let reply = ws.next().await.unwrap().unwrap();
            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::from(4001),
                reason: "bye".into(),
            })))
            .await
            .unwrap();
            reply
        });

        let url = Url::parse(&format!("ws://{addr}/stream?token=t")).unwrap();
        let mut link = WebSocketTransport::new().open(&url).await.unwrap();

        assert_eq!(
            link.inbound.recv().await,
            Some(TransportEvent::Frame(r#"{"type":"HEARTBEAT"}"#.to_string()))
        );

        link.outbound
            .send(OutboundFrame::Text("pong".to_string()))
            .unwrap();
        assert_eq!(
            link.inbound.recv().await,
            Some(TransportEvent::Closed {
                code: 4001,
                reason: "bye".to_string(),
            })
        );

        let reply = server.await.unwrap();
        assert_eq!(reply, Message::Text("pong".into()));
    }

    #[tokio::test]
    async fn invalid_utf8_binary_is_counted_as_malformed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Binary(vec![0xff, 0xfe].into()))
                .await
                .unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
        });

        let config = FeedClientConfig::new(format!("ws://{addr}/stream"), "t");
        let client = FeedClient::new(config, Arc::new(WebSocketTransport::new())).unwrap();
        let mut events = client.events();
        client.connect().await.unwrap();

        let error = timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(FeedEvent::MessageError { error }) = events.recv().await {
                    return error;
                }
            }
        })
        .await
        .unwrap();

        assert!(!error.is_empty());
        assert_eq!(client.metrics().messages_dropped, 1);
        assert_eq!(client.connection_state(), ConnectionState::Connected);

        client.destroy();
        server.await.unwrap();
    }
}
