//! Feed Events
//!
//! Every notification the client emits, as one tagged enum delivered in
//! order over a broadcast channel. Data frames produce a per-type variant
//! followed by the same payload on [`FeedEvent::MarketData`].

use std::time::Duration;

use crate::domain::streaming::{
    DepthUpdate, HeartbeatUpdate, MarketDataUpdate, NewsUpdate, QuoteUpdate, TradeUpdate,
};

/// Notification emitted by the feed client.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A connection attempt started.
    Connecting,
    /// The connection is open and subscriptions were replayed.
    Connected,
    /// The connection closed.
    Disconnected {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
        /// The client initiated the close.
        clean: bool,
    },
    /// A retry was scheduled.
    Reconnecting {
        /// 1-based retry number.
        attempt: u32,
        /// Wait before the retry.
        delay: Duration,
        /// Retry budget.
        max_attempts: u32,
    },
    /// The retry budget is spent.
    Failed {
        /// Last failure.
        error: String,
        /// Retries made.
        attempts: u32,
    },
    /// Quote frame.
    Quote(QuoteUpdate),
    /// Trade frame.
    Trade(TradeUpdate),
    /// Level-2 depth frame.
    Level2(DepthUpdate),
    /// News frame.
    News(NewsUpdate),
    /// Heartbeat frame.
    Heartbeat(HeartbeatUpdate),
    /// Any data frame, mirrored after its per-type event.
    MarketData(MarketDataUpdate),
    /// The server acknowledged a subscription.
    SubscriptionAck {
        /// Acknowledged symbols.
        symbols: Vec<String>,
        /// Acknowledged update types.
        types: Vec<String>,
        /// Server accepted the request.
        success: bool,
    },
    /// The server reported an application error.
    ServerError {
        /// Error code, when given.
        code: Option<String>,
        /// Error text.
        message: String,
    },
    /// An inbound frame could not be parsed.
    MessageError {
        /// Parse failure.
        error: String,
    },
    /// No heartbeat arrived within the timeout.
    HeartbeatTimeout,
}

impl FeedEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Failed { .. } => "failed",
            Self::Quote(_) => "quote",
            Self::Trade(_) => "trade",
            Self::Level2(_) => "level2",
            Self::News(_) => "news",
            Self::Heartbeat(_) => "heartbeat",
            Self::MarketData(_) => "marketData",
            Self::SubscriptionAck { .. } => "subscriptionAck",
            Self::ServerError { .. } => "serverError",
            Self::MessageError { .. } => "messageError",
            Self::HeartbeatTimeout => "heartbeatTimeout",
        }
    }
}
