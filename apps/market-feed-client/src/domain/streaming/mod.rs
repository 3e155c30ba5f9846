//! Market Data Streaming Types
//!
//! Core domain types for market data: quotes, trades, order-book depth,
//! news and heartbeats. These types are codec-agnostic and represent the
//! canonical internal representation of one inbound frame.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Payloads
// =============================================================================

/// Top-of-book quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteUpdate {
    /// Ticker symbol.
    pub symbol: String,
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Size at the bid.
    pub bid_size: Decimal,
    /// Size at the ask.
    pub ask_size: Decimal,
    /// `ask - bid`, computed on receipt.
    pub spread: Decimal,
    /// Feed timestamp, or local receipt time when the feed omitted it.
    pub timestamp: DateTime<Utc>,
}

impl QuoteUpdate {
    /// Build a quote, deriving the spread.
    #[must_use]
    pub fn new(
        symbol: String,
        bid: Decimal,
        ask: Decimal,
        bid_size: Decimal,
        ask_size: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol,
            bid,
            ask,
            bid_size,
            ask_size,
            spread: ask - bid,
            timestamp,
        }
    }

    /// Get the mid price.
    #[must_use]
    pub fn mid_price(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Buyer-initiated.
    Buy,
    /// Seller-initiated.
    Sell,
}

/// Executed trade print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeUpdate {
    /// Ticker symbol.
    pub symbol: String,
    /// Execution price.
    pub price: Decimal,
    /// Execution size.
    pub size: Decimal,
    /// Aggressor side, when the feed reports it.
    pub side: Option<TradeSide>,
    /// Venue trade identifier, when the feed reports it.
    pub trade_id: Option<String>,
    /// Feed timestamp, or local receipt time when the feed omitted it.
    pub timestamp: DateTime<Utc>,
}

/// One aggregated order-book level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    /// Level price.
    pub price: Decimal,
    /// Aggregate size at this price.
    pub size: Decimal,
    /// Number of resting orders, when reported.
    pub orders: Option<u32>,
}

/// One frame's worth of level-2 depth, forwarded as received.
///
/// Levels keep the order they arrived in; no book is reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthUpdate {
    /// Ticker symbol.
    pub symbol: String,
    /// Bid levels.
    pub bids: Vec<BookLevel>,
    /// Ask levels.
    pub asks: Vec<BookLevel>,
    /// Feed timestamp, or local receipt time when the feed omitted it.
    pub timestamp: DateTime<Utc>,
}

/// News item with an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsUpdate {
    /// Ticker symbol the item is tagged with.
    pub symbol: String,
    /// Every field of the frame other than the envelope.
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Feed timestamp, or local receipt time when the feed omitted it.
    pub timestamp: DateTime<Utc>,
}

/// Liveness frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatUpdate {
    /// Server asked for a `HEARTBEAT_RESPONSE`.
    pub requires_response: bool,
    /// Feed timestamp, or local receipt time when the feed omitted it.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Unified Update
// =============================================================================

/// Any market data update decoded from one inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketDataUpdate {
    /// Top-of-book quote.
    Quote(QuoteUpdate),
    /// Trade print.
    Trade(TradeUpdate),
    /// Level-2 depth snapshot for one frame.
    Level2Depth(DepthUpdate),
    /// News item.
    News(NewsUpdate),
    /// Liveness frame.
    ///
    /// Part of the update model so heartbeats serialize and convert like any
    /// other frame. The client reports them only as `FeedEvent::Heartbeat`
    /// and never on the unified market data stream.
    Heartbeat(HeartbeatUpdate),
}

impl MarketDataUpdate {
    /// Symbol the update refers to. Heartbeats carry none.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Quote(q) => Some(&q.symbol),
            Self::Trade(t) => Some(&t.symbol),
            Self::Level2Depth(d) => Some(&d.symbol),
            Self::News(n) => Some(&n.symbol),
            Self::Heartbeat(_) => None,
        }
    }

    /// Timestamp of the update.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Quote(q) => q.timestamp,
            Self::Trade(t) => t.timestamp,
            Self::Level2Depth(d) => d.timestamp,
            Self::News(n) => n.timestamp,
            Self::Heartbeat(h) => h.timestamp,
        }
    }

    /// Short name used for metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Quote(_) => "quote",
            Self::Trade(_) => "trade",
            Self::Level2Depth(_) => "level2",
            Self::News(_) => "news",
            Self::Heartbeat(_) => "heartbeat",
        }
    }
}
