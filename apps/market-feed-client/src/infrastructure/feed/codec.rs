//! Feed Codec
//!
//! JSON encoding and decoding for feed envelopes. Decoding parses the frame
//! once into a `serde_json::Value`, reads the `type` discriminator, and then
//! deserializes the matching wire struct.

use serde_json::Value;

use crate::infrastructure::feed::messages::{
    ErrorMessage, HeartbeatMessage, InboundMessage, Level2Message, NewsMessage, OutboundMessage,
    QuoteMessage, SubscriptionAckMessage, TradeMessage, inbound_type,
};

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Frame is not JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Frame is JSON but not an object.
    #[error("expected JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Object has no string `type` field.
    #[error("missing message type")]
    MissingType,

    /// `type` names no known message.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Known type with fields that do not fit.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// Message type.
        kind: &'static str,
        /// Deserializer message.
        reason: String,
    },

    /// Outbound message could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}

/// JSON codec for the feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object, has no known
    /// `type`, or its fields do not match that type.
    pub fn decode(&self, text: &str) -> Result<InboundMessage, CodecError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CodecError::InvalidJson(e.to_string()))?;

        let kind = match &value {
            Value::Object(map) => map
                .get("type")
                .and_then(Value::as_str)
                .ok_or(CodecError::MissingType)?
                .to_owned(),
            other => return Err(CodecError::NotAnObject(json_kind(other))),
        };

        let message = match kind.as_str() {
            inbound_type::HEARTBEAT => {
                InboundMessage::Heartbeat(parse::<HeartbeatMessage>(inbound_type::HEARTBEAT, value)?)
            }
            inbound_type::QUOTE => {
                InboundMessage::Quote(parse::<QuoteMessage>(inbound_type::QUOTE, value)?)
            }
            inbound_type::TRADE => {
                InboundMessage::Trade(parse::<TradeMessage>(inbound_type::TRADE, value)?)
            }
            inbound_type::LEVEL2 => {
                InboundMessage::Level2(parse::<Level2Message>(inbound_type::LEVEL2, value)?)
            }
            inbound_type::NEWS => {
                InboundMessage::News(parse::<NewsMessage>(inbound_type::NEWS, value)?)
            }
            inbound_type::SUBSCRIPTION_ACK => InboundMessage::SubscriptionAck(parse::<
                SubscriptionAckMessage,
            >(
                inbound_type::SUBSCRIPTION_ACK,
                value,
            )?),
            inbound_type::ERROR => {
                InboundMessage::Error(parse::<ErrorMessage>(inbound_type::ERROR, value)?)
            }
            _ => return Err(CodecError::UnknownMessageType(kind)),
        };

        Ok(message)
    }

    /// Encode an outbound message.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, message: &OutboundMessage) -> Result<String, CodecError> {
        serde_json::to_string(message).map_err(|e| CodecError::Encode(e.to_string()))
    }
}

fn parse<T: serde::de::DeserializeOwned>(kind: &'static str, value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(|e| CodecError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn decode_quote() {
        let codec = JsonCodec::new();
        let msg = codec
            .decode(r#"{"type":"QUOTE","symbol":"AAPL","bid":100.0,"ask":100.05,"bidSize":3,"askSize":4,"timestamp":1700000000000}"#)
            .unwrap();

        let InboundMessage::Quote(quote) = msg else {
            panic!("expected quote, got {msg:?}");
        };
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.ask - quote.bid, Decimal::new(5, 2));
        assert_eq!(quote.bid_size, Decimal::from(3));
    }

    #[test]
    fn decode_quote_with_string_prices() {
        let codec = JsonCodec::new();
        let msg = codec
            .decode(r#"{"type":"QUOTE","symbol":"AAPL","bid":"187.25","ask":"187.30"}"#)
            .unwrap();
        let InboundMessage::Quote(quote) = msg else {
            panic!("expected quote");
        };
        assert_eq!(quote.bid, Decimal::new(18725, 2));
        assert_eq!(quote.bid_size, Decimal::ZERO);
    }

    #[test]
    fn decode_trade_with_numeric_id() {
        let codec = JsonCodec::new();
        let msg = codec
            .decode(r#"{"type":"TRADE","symbol":"TSLA","price":250.5,"size":10,"side":"sell","tradeId":42}"#)
            .unwrap();
        let InboundMessage::Trade(trade) = msg else {
            panic!("expected trade");
        };
        let update = trade.into_update(chrono::Utc::now());
        assert_eq!(update.trade_id.as_deref(), Some("42"));
        assert_eq!(update.side, Some(crate::domain::streaming::TradeSide::Sell));
    }

    #[test]
    fn decode_level2_keeps_order() {
        let codec = JsonCodec::new();
        let msg = codec
            .decode(
                r#"{"type":"LEVEL2","symbol":"MSFT","bids":[{"price":10,"size":1},{"price":11,"size":2,"orders":3}],"asks":[]}"#,
            )
            .unwrap();
        let InboundMessage::Level2(depth) = msg else {
            panic!("expected level2");
        };
        assert_eq!(depth.bids[0].price, Decimal::from(10));
        assert_eq!(depth.bids[1].orders, Some(3));
    }

    #[test]
    fn decode_news_keeps_payload() {
        let codec = JsonCodec::new();
        let msg = codec
            .decode(r#"{"type":"NEWS","symbol":"AAPL","headline":"Earnings beat","source":"wire"}"#)
            .unwrap();
        let InboundMessage::News(news) = msg else {
            panic!("expected news");
        };
        let update = news.into_update(chrono::Utc::now());
        assert_eq!(update.payload["headline"], "Earnings beat");
        assert!(!update.payload.contains_key("type"));
    }

    #[test]
    fn decode_control_messages() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode(r#"{"type":"HEARTBEAT","requiresResponse":true}"#),
            Ok(InboundMessage::Heartbeat(HeartbeatMessage { requires_response: true, .. }))
        ));
        assert!(matches!(
            codec.decode(r#"{"type":"SUBSCRIPTION_ACK","symbols":["AAPL"],"subscriptions":["quotes"]}"#),
            Ok(InboundMessage::SubscriptionAck(SubscriptionAckMessage { success: true, .. }))
        ));
        assert!(matches!(
            codec.decode(r#"{"type":"ERROR","code":"RATE_LIMIT","message":"too many"}"#),
            Ok(InboundMessage::Error(_))
        ));
    }

    #[test]
    fn decode_errors() {
        let codec = JsonCodec::new();
        assert!(matches!(codec.decode("not json"), Err(CodecError::InvalidJson(_))));
        assert_eq!(codec.decode("[1,2]"), Err(CodecError::NotAnObject("array")));
        assert_eq!(codec.decode(r#"{"symbol":"AAPL"}"#), Err(CodecError::MissingType));
        assert_eq!(
            codec.decode(r#"{"type":"BAR"}"#),
            Err(CodecError::UnknownMessageType("BAR".to_string()))
        );
        assert!(matches!(
            codec.decode(r#"{"type":"QUOTE","symbol":"AAPL","bid":"abc","ask":1}"#),
            Err(CodecError::InvalidPayload { kind: "QUOTE", .. })
        ));
    }
}
