//! Message Router
//!
//! Classifies inbound frames and dispatches them as [`FeedEvent`]s.
//!
//! Malformed frames never fail the connection: they bump the dropped
//! counter and surface as [`FeedEvent::MessageError`]. Data frames are
//! emitted once under their own variant and once on
//! [`FeedEvent::MarketData`], in that order.

use std::time::Instant;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::metrics::MessageStats;
use crate::domain::streaming::{HeartbeatUpdate, MarketDataUpdate};
use crate::infrastructure::feed::codec::JsonCodec;
use crate::infrastructure::feed::events::FeedEvent;
use crate::infrastructure::feed::messages::InboundMessage;
use crate::infrastructure::metrics;

/// Frame classifier and dispatcher with message accounting.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    codec: JsonCodec,
    stats: MessageStats,
}

impl MessageRouter {
    /// Create a router keeping `latency_window` latency samples.
    #[must_use]
    pub fn new(latency_window: usize) -> Self {
        Self {
            codec: JsonCodec::new(),
            stats: MessageStats::new(latency_window),
        }
    }

    /// Message accounting so far.
    #[must_use]
    pub const fn stats(&self) -> &MessageStats {
        &self.stats
    }

    /// Mutable message accounting, for outbound counters.
    pub const fn stats_mut(&mut self) -> &mut MessageStats {
        &mut self.stats
    }

    /// Route one inbound frame.
    ///
    /// `received_at` is the runtime clock at receipt. It drives the
    /// recent-message check and starts the latency sample, which ends once
    /// dispatch completes. Returns the heartbeat if the frame was one.
    pub fn route(
        &mut self,
        text: &str,
        received_at: Instant,
        events: &broadcast::Sender<FeedEvent>,
    ) -> Option<HeartbeatUpdate> {
        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.stats.record_dropped();
                metrics::record_message_dropped();
                emit(events, FeedEvent::MessageError { error: e.to_string() });
                return None;
            }
        };

        self.stats.record_received(received_at);
        let now = Utc::now();

        let heartbeat = match message {
            InboundMessage::Heartbeat(hb) => {
                let update = hb.into_update(now);
                emit(events, FeedEvent::Heartbeat(update));
                metrics::record_message_received("heartbeat");
                Some(update)
            }
            InboundMessage::Quote(quote) => {
                let update = quote.into_update(now);
                emit(events, FeedEvent::Quote(update.clone()));
                publish(events, MarketDataUpdate::Quote(update));
                None
            }
            InboundMessage::Trade(trade) => {
                let update = trade.into_update(now);
                emit(events, FeedEvent::Trade(update.clone()));
                publish(events, MarketDataUpdate::Trade(update));
                None
            }
            InboundMessage::Level2(depth) => {
                let update = depth.into_update(now);
                emit(events, FeedEvent::Level2(update.clone()));
                publish(events, MarketDataUpdate::Level2Depth(update));
                None
            }
            InboundMessage::News(news) => {
                let update = news.into_update(now);
                emit(events, FeedEvent::News(update.clone()));
                publish(events, MarketDataUpdate::News(update));
                None
            }
            InboundMessage::SubscriptionAck(ack) => {
                debug!(symbols = ?ack.symbols, success = ack.success, "Subscription acknowledged");
                metrics::record_message_received("subscription_ack");
                emit(
                    events,
                    FeedEvent::SubscriptionAck {
                        symbols: ack.symbols,
                        types: ack.subscriptions,
                        success: ack.success,
                    },
                );
                None
            }
            InboundMessage::Error(err) => {
                let code = err.code_text();
                warn!(code = ?code, message = %err.message, "Server reported error");
                metrics::record_message_received("error");
                emit(
                    events,
                    FeedEvent::ServerError {
                        code,
                        message: err.message,
                    },
                );
                None
            }
        };

        let elapsed = tokio::time::Instant::now()
            .into_std()
            .saturating_duration_since(received_at);
        self.stats.record_latency(elapsed);
        metrics::record_processing_duration(elapsed);
        heartbeat
    }
}

fn publish(events: &broadcast::Sender<FeedEvent>, update: MarketDataUpdate) {
    metrics::record_message_received(update.kind());
    emit(events, FeedEvent::MarketData(update));
}

fn emit(events: &broadcast::Sender<FeedEvent>, event: FeedEvent) {
    // No receivers is not an error.
    let _ = events.send(event);
}
