//! Feed Wire Message Types
//!
//! JSON envelopes exchanged with the feed endpoint. Every envelope carries a
//! `type` discriminator.
//!
//! # Outbound
//!
//! - `SUBSCRIBE` / `UNSUBSCRIBE`: `{type, symbols, subscriptions, throttleMs?, depth?, timestamp}`
//! - `HEARTBEAT_RESPONSE`: `{type, timestamp}`
//!
//! # Inbound
//!
//! `{type, symbol?, timestamp?, ...}` with `type` one of `HEARTBEAT`, `QUOTE`,
//! `TRADE`, `LEVEL2`, `NEWS`, `SUBSCRIPTION_ACK`, `ERROR`.
//!
//! Inbound timestamps may be RFC 3339 strings or epoch milliseconds. A
//! missing or unreadable timestamp is replaced by the local receipt time.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::streaming::{
    BookLevel, DepthUpdate, HeartbeatUpdate, NewsUpdate, QuoteUpdate, TradeSide, TradeUpdate,
};
use crate::domain::subscription::{SubscriptionRequest, UpdateType};

// =============================================================================
// Discriminators
// =============================================================================

/// Inbound `type` values.
pub mod inbound_type {
    /// Liveness frame.
    pub const HEARTBEAT: &str = "HEARTBEAT";
    /// Top-of-book quote.
    pub const QUOTE: &str = "QUOTE";
    /// Trade print.
    pub const TRADE: &str = "TRADE";
    /// Order-book depth.
    pub const LEVEL2: &str = "LEVEL2";
    /// News item.
    pub const NEWS: &str = "NEWS";
    /// Subscription acknowledgement.
    pub const SUBSCRIPTION_ACK: &str = "SUBSCRIPTION_ACK";
    /// Server-reported error.
    pub const ERROR: &str = "ERROR";
}

// =============================================================================
// Timestamps
// =============================================================================

/// Timestamp as sent by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// RFC 3339 text.
    Text(String),
}

impl WireTimestamp {
    /// Parse into UTC, if well formed.
    #[must_use]
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

fn resolve(timestamp: Option<&WireTimestamp>, received_at: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .and_then(WireTimestamp::to_utc)
        .unwrap_or(received_at)
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// `HEARTBEAT` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatMessage {
    /// Server asks for a `HEARTBEAT_RESPONSE`.
    #[serde(default)]
    pub requires_response: bool,
    /// Feed timestamp.
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

impl HeartbeatMessage {
    /// Convert to the domain type.
    #[must_use]
    pub fn into_update(self, received_at: DateTime<Utc>) -> HeartbeatUpdate {
        HeartbeatUpdate {
            requires_response: self.requires_response,
            timestamp: resolve(self.timestamp.as_ref(), received_at),
        }
    }
}

/// `QUOTE` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteMessage {
    /// Ticker symbol.
    pub symbol: String,
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Size at the bid.
    #[serde(default)]
    pub bid_size: Decimal,
    /// Size at the ask.
    #[serde(default)]
    pub ask_size: Decimal,
    /// Feed timestamp.
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

impl QuoteMessage {
    /// Convert to the domain type, deriving the spread.
    #[must_use]
    pub fn into_update(self, received_at: DateTime<Utc>) -> QuoteUpdate {
        let timestamp = resolve(self.timestamp.as_ref(), received_at);
        QuoteUpdate::new(
            self.symbol,
            self.bid,
            self.ask,
            self.bid_size,
            self.ask_size,
            timestamp,
        )
    }
}

/// `TRADE` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMessage {
    /// Ticker symbol.
    pub symbol: String,
    /// Execution price.
    pub price: Decimal,
    /// Execution size.
    pub size: Decimal,
    /// Aggressor side.
    #[serde(default)]
    pub side: Option<WireSide>,
    /// Venue trade id, string or number.
    #[serde(default)]
    pub trade_id: Option<serde_json::Value>,
    /// Feed timestamp.
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

/// Trade side as sent by the feed, in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireSide {
    /// Buyer-initiated.
    #[serde(alias = "buy", alias = "BUY", alias = "b", alias = "B")]
    Buy,
    /// Seller-initiated.
    #[serde(alias = "sell", alias = "SELL", alias = "s", alias = "S")]
    Sell,
}

impl From<WireSide> for TradeSide {
    fn from(side: WireSide) -> Self {
        match side {
            WireSide::Buy => Self::Buy,
            WireSide::Sell => Self::Sell,
        }
    }
}

impl TradeMessage {
    /// Convert to the domain type.
    #[must_use]
    pub fn into_update(self, received_at: DateTime<Utc>) -> TradeUpdate {
        let trade_id = self.trade_id.and_then(|id| match id {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        TradeUpdate {
            timestamp: resolve(self.timestamp.as_ref(), received_at),
            symbol: self.symbol,
            price: self.price,
            size: self.size,
            side: self.side.map(Into::into),
            trade_id,
        }
    }
}

/// One book level on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLevel {
    /// Level price.
    pub price: Decimal,
    /// Aggregate size.
    pub size: Decimal,
    /// Resting order count.
    #[serde(default)]
    pub orders: Option<u32>,
}

impl From<WireLevel> for BookLevel {
    fn from(level: WireLevel) -> Self {
        Self {
            price: level.price,
            size: level.size,
            orders: level.orders,
        }
    }
}

/// `LEVEL2` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level2Message {
    /// Ticker symbol.
    pub symbol: String,
    /// Bid levels in feed order.
    #[serde(default)]
    pub bids: Vec<WireLevel>,
    /// Ask levels in feed order.
    #[serde(default)]
    pub asks: Vec<WireLevel>,
    /// Feed timestamp.
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

impl Level2Message {
    /// Convert to the domain type, keeping level order.
    #[must_use]
    pub fn into_update(self, received_at: DateTime<Utc>) -> DepthUpdate {
        DepthUpdate {
            timestamp: resolve(self.timestamp.as_ref(), received_at),
            symbol: self.symbol,
            bids: self.bids.into_iter().map(Into::into).collect(),
            asks: self.asks.into_iter().map(Into::into).collect(),
        }
    }
}

/// `NEWS` frame. Everything besides the envelope is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsMessage {
    /// Ticker symbol.
    pub symbol: String,
    /// Feed timestamp.
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
    /// Remaining fields.
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl NewsMessage {
    /// Convert to the domain type.
    #[must_use]
    pub fn into_update(mut self, received_at: DateTime<Utc>) -> NewsUpdate {
        self.payload.remove("type");
        NewsUpdate {
            timestamp: resolve(self.timestamp.as_ref(), received_at),
            symbol: self.symbol,
            payload: self.payload,
        }
    }
}

/// `SUBSCRIPTION_ACK` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionAckMessage {
    /// Acknowledged symbols.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Acknowledged update types.
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Server accepted the request.
    #[serde(default = "default_true")]
    pub success: bool,
}

const fn default_true() -> bool {
    true
}

/// `ERROR` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code, string or number.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Error text.
    #[serde(default)]
    pub message: String,
}

impl ErrorMessage {
    /// Error code as text.
    #[must_use]
    pub fn code_text(&self) -> Option<String> {
        match self.code.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Any decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `HEARTBEAT`.
    Heartbeat(HeartbeatMessage),
    /// `QUOTE`.
    Quote(QuoteMessage),
    /// `TRADE`.
    Trade(TradeMessage),
    /// `LEVEL2`.
    Level2(Level2Message),
    /// `NEWS`.
    News(NewsMessage),
    /// `SUBSCRIPTION_ACK`.
    SubscriptionAck(SubscriptionAckMessage),
    /// `ERROR`.
    Error(ErrorMessage),
}

// =============================================================================
// Outbound Messages
// =============================================================================

/// Body of `SUBSCRIBE` and `UNSUBSCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFrame {
    /// Symbols, sorted.
    pub symbols: Vec<String>,
    /// Update types, sorted.
    pub subscriptions: Vec<UpdateType>,
    /// Throttle interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_ms: Option<u64>,
    /// Book depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Send time, epoch milliseconds.
    pub timestamp: i64,
}

impl SubscriptionFrame {
    /// Build a frame for a request.
    #[must_use]
    pub fn new(request: &SubscriptionRequest, now: DateTime<Utc>) -> Self {
        Self {
            symbols: request.symbols.iter().cloned().collect(),
            subscriptions: request.types.iter().copied().collect(),
            throttle_ms: request.throttle_ms,
            depth: request.depth,
            timestamp: now.timestamp_millis(),
        }
    }
}

/// Body of `HEARTBEAT_RESPONSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponseFrame {
    /// Send time, epoch milliseconds.
    pub timestamp: i64,
}

/// Any frame the client writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    /// Start receiving a subscription.
    Subscribe(SubscriptionFrame),
    /// Stop receiving a subscription.
    Unsubscribe(SubscriptionFrame),
    /// Answer a heartbeat that asked for one.
    HeartbeatResponse(HeartbeatResponseFrame),
}

impl OutboundMessage {
    /// `SUBSCRIBE` for a request, stamped now.
    #[must_use]
    pub fn subscribe(request: &SubscriptionRequest) -> Self {
        Self::Subscribe(SubscriptionFrame::new(request, Utc::now()))
    }

    /// `UNSUBSCRIBE` for a request, stamped now.
    #[must_use]
    pub fn unsubscribe(request: &SubscriptionRequest) -> Self {
        Self::Unsubscribe(SubscriptionFrame::new(request, Utc::now()))
    }

    /// `HEARTBEAT_RESPONSE`, stamped now.
    #[must_use]
    pub fn heartbeat_response() -> Self {
        Self::HeartbeatResponse(HeartbeatResponseFrame {
            timestamp: Utc::now().timestamp_millis(),
        })
    }
}
