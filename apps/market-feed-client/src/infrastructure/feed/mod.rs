//! Market Data Feed
//!
//! The resilience core of the client.
//!
//! - `client`: the connection manager and public contract ([`FeedClient`])
//! - `circuit_breaker`: gates attempts after repeated failures
//! - `reconnect`: exponential backoff with jitter and an attempt budget
//! - `heartbeat`: liveness deadline for one connection
//! - `outbound`: bounded drop-oldest queue for frames written while offline
//! - `messages` and `codec`: wire envelopes and their JSON encoding
//! - `router`: inbound classification, dispatch and message accounting
//! - `events`: the notifications consumers receive

pub mod circuit_breaker;
pub mod client;
pub mod codec;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod messages;
pub mod outbound;
pub mod reconnect;
pub mod router;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{CLIENT_INITIATED_REASON, FeedClient};
pub use codec::{CodecError, JsonCodec};
pub use error::FeedError;
pub use events::FeedEvent;
pub use heartbeat::{HeartbeatConfig, HeartbeatMonitor};
pub use messages::OutboundMessage;
pub use outbound::OutboundQueue;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use router::MessageRouter;
