#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Market Feed Client - Resilient Streaming Market Data
//!
//! Maintains one subscription-based market data feed over a long-lived,
//! unreliable connection and hands typed updates to consumers, surviving
//! network failures without losing or duplicating subscriptions.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core feed types with no I/O
//!   - `connection`: Connection lifecycle state
//!   - `streaming`: Market data updates (quotes, trades, depth, news, heartbeats)
//!   - `subscription`: Canonical subscription keys and the registry
//!   - `metrics`: Message counters and the latency window
//!
//! - **Application**: Port definitions and pure services
//!   - `ports`: The transport interface the client drives
//!   - `services`: Health evaluation
//!
//! - **Infrastructure**: The client and its adapters
//!   - `feed`: Connection manager, circuit breaker, backoff, heartbeat, router
//!   - `transport`: WebSocket and in-process channel transports
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing subscriber and OTLP export
//!
//! # Data Flow
//!
//! ```text
//!                  ┌──────────────┐   frames   ┌───────────────┐
//!   Feed server ◄──┤  Transport   ├───────────►│ MessageRouter │──► FeedEvent ──► consumers
//!                  └──────▲───────┘            └───────────────┘
//!                         │ open / close
//!                  ┌──────┴───────┐
//!   connect() ────►│  FeedClient  │◄── CircuitBreaker, ReconnectPolicy,
//!                  └──────────────┘    HeartbeatMonitor, SubscriptionRegistry
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use market_feed_client::{
//!     FeedClient, FeedClientConfig, FeedEvent, SubscriptionRequest, UpdateType, WebSocketTransport,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FeedClientConfig::new("wss://feed.example.com/stream", "token");
//! let client = FeedClient::new(config, Arc::new(WebSocketTransport::new()))?;
//! let mut events = client.events();
//!
//! client.subscribe(SubscriptionRequest::new(["AAPL"], [UpdateType::Quotes]))?;
//! client.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let FeedEvent::Quote(quote) = event {
//!         println!("{} spread {}", quote.symbol, quote.spread);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core feed types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::ConnectionState;
pub use domain::metrics::FeedMetrics;
pub use domain::streaming::{
    BookLevel, DepthUpdate, HeartbeatUpdate, MarketDataUpdate, NewsUpdate, QuoteUpdate,
    TradeSide, TradeUpdate,
};
pub use domain::subscription::{
    SubscriptionKey, SubscriptionRegistry, SubscriptionRequest, UpdateType,
};

// Ports
pub use application::ports::{
    OutboundFrame, Transport, TransportError, TransportEvent, TransportLink,
};

// Health evaluation
pub use application::services::{HealthChecks, HealthReport, HealthStatus};

// Feed client
pub use infrastructure::feed::{
    CircuitBreakerConfig, CircuitState, FeedClient, FeedError, FeedEvent, HeartbeatConfig,
    OutboundMessage, ReconnectConfig,
};

// Transports
pub use infrastructure::transport::{
    ChannelPeer, ChannelTransport, ConnectMode, PeerConnection, WebSocketTransport,
};

// Infrastructure config
pub use infrastructure::config::{AppConfig, ConfigError, FeedClientConfig, ServerSettings};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
