//! Feed Client
//!
//! Owns one logical connection to the feed and everything that keeps it
//! alive: the circuit breaker, the reconnect policy, the heartbeat monitor,
//! the subscription registry, the outbound queue and the message router.
//!
//! # Concurrency
//!
//! All state lives behind one mutex. Transport I/O, timers and the inbound
//! session loop run on spawned tasks and re-enter the state only through
//! short, synchronous critical sections. Each connection attempt, session
//! and retry timer is stamped with an epoch; a transition from a stale epoch
//! is ignored, so a `disconnect` or `destroy` makes every outstanding timer
//! and session inert before it returns.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect──► Connecting ──open──► Connected
//!       ▲                       │                    │
//!       │                   fail/timeout        close/error/
//!  disconnect                   │              heartbeat timeout
//!       │                       ▼                    │
//!       └──────────────── Reconnecting ◄─────────────┘
//!                               │
//!                        budget exhausted
//!                               ▼
//!                            Failed ──connect──► Connecting
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::application::ports::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, OutboundFrame, Transport, TransportEvent, TransportLink,
};
use crate::application::services::{HealthInputs, HealthReport};
use crate::domain::connection::ConnectionState;
use crate::domain::metrics::FeedMetrics;
use crate::domain::subscription::{SubscriptionRegistry, SubscriptionRequest};
use crate::infrastructure::config::{ConfigError, FeedClientConfig};
use crate::infrastructure::feed::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::infrastructure::feed::codec::JsonCodec;
use crate::infrastructure::feed::error::FeedError;
use crate::infrastructure::feed::events::FeedEvent;
use crate::infrastructure::feed::heartbeat::{
    HEARTBEAT_TIMEOUT_CLOSE_CODE, HEARTBEAT_TIMEOUT_REASON, HeartbeatMonitor,
};
use crate::infrastructure::feed::messages::OutboundMessage;
use crate::infrastructure::feed::outbound::OutboundQueue;
use crate::infrastructure::feed::reconnect::ReconnectPolicy;
use crate::infrastructure::feed::router::MessageRouter;
use crate::infrastructure::metrics;

/// Close reason sent on `disconnect` and `destroy`.
pub const CLIENT_INITIATED_REASON: &str = "client-initiated";

/// Close reason sent when an opened link lost the race to a newer transition.
const SUPERSEDED_REASON: &str = "superseded";

/// Shortest wait when a due retry finds the breaker still refusing.
const MIN_DEFERRED_RETRY: Duration = Duration::from_millis(100);

/// Resilient streaming client for one feed endpoint.
///
/// Cloning yields another handle to the same client. Spawned sessions and
/// retry timers hold a handle too, so call [`FeedClient::destroy`] to stop
/// a client for good.
#[derive(Clone)]
pub struct FeedClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: FeedClientConfig,
    endpoint: Url,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<FeedEvent>,
    codec: JsonCodec,
    state: Mutex<Shared>,
}

struct Shared {
    connection: ConnectionState,
    epoch: u64,
    destroyed: bool,
    link: Option<mpsc::UnboundedSender<OutboundFrame>>,
    session: Option<CancellationToken>,
    retry: Option<CancellationToken>,
    breaker: CircuitBreaker,
    reconnect: ReconnectPolicy,
    registry: SubscriptionRegistry,
    outbound: OutboundQueue,
    router: MessageRouter,
    last_error: Option<String>,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.state.lock();
        f.debug_struct("FeedClient")
            .field("url", &self.inner.config.url)
            .field("connection", &shared.connection)
            .field("circuit", &shared.breaker.state())
            .field("subscriptions", &shared.registry.len())
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    /// Create a disconnected client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL cannot be parsed.
    pub fn new(config: FeedClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let shared = Shared {
            connection: ConnectionState::Disconnected,
            epoch: 0,
            destroyed: false,
            link: None,
            session: None,
            retry: None,
            breaker: CircuitBreaker::new(config.circuit_breaker),
            reconnect: ReconnectPolicy::new(config.reconnect),
            registry: SubscriptionRegistry::new(),
            outbound: OutboundQueue::new(config.outbound_queue_capacity),
            router: MessageRouter::new(config.latency_window),
            last_error: None,
        };

        metrics::set_connection_state(ConnectionState::Disconnected);
        metrics::set_circuit_state(CircuitState::Closed);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                endpoint,
                transport,
                events,
                codec: JsonCodec::new(),
                state: Mutex::new(shared),
            }),
        })
    }

    /// Subscribe to client notifications.
    ///
    /// Each receiver sees every event emitted after this call, in order.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.inner.events.subscribe()
    }

    /// Open the connection.
    ///
    /// Returns once the transport is open and subscriptions were replayed.
    /// Succeeds immediately when already connected. A pending retry timer is
    /// replaced by this attempt. A failed attempt schedules a retry before
    /// returning its error. Dropping the returned future does not cancel the
    /// attempt; it runs to completion in the background.
    ///
    /// # Errors
    ///
    /// - [`FeedError::CircuitOpen`] if the breaker refuses the attempt
    /// - [`FeedError::ConnectInProgress`] if an attempt is already running
    /// - [`FeedError::ConnectTimeout`] or [`FeedError::Transport`] if the open fails
    /// - [`FeedError::Superseded`] if `disconnect` or `destroy` overtook the attempt
    /// - [`FeedError::Destroyed`] after `destroy`
    pub async fn connect(&self) -> Result<(), FeedError> {
        let (epoch, token) = {
            let mut guard = self.inner.state.lock();
            let shared = &mut *guard;

            if shared.destroyed {
                return Err(FeedError::Destroyed);
            }
            match shared.connection {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => return Err(FeedError::ConnectInProgress),
                ConnectionState::Disconnected
                | ConnectionState::Reconnecting
                | ConnectionState::Failed => {}
            }

            if let Err(retry_in) = shared.breaker.try_acquire(Instant::now()) {
                warn!(
                    retry_in_ms = u64::try_from(retry_in.as_millis()).unwrap_or(u64::MAX),
                    "Connect refused by open circuit"
                );
                return Err(FeedError::CircuitOpen { retry_in });
            }
            metrics::set_circuit_state(shared.breaker.state());

            if shared.connection == ConnectionState::Failed {
                shared.reconnect.reset();
            }
            self.inner.begin_attempt(shared)
        };

        // The attempt owns its timeout and failure path, so dropping this
        // future never strands the client in `Connecting`.
        let attempt = tokio::spawn(Arc::clone(&self.inner).attempt(epoch, token));
        attempt.await.unwrap_or_else(|e| {
            error!(error = %e, "Connect attempt task aborted");
            Err(FeedError::Superseded)
        })
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Cancels every timer and the session before returning. Registered
    /// subscriptions are kept and replayed on the next `connect`.
    pub fn disconnect(&self) {
        let mut guard = self.inner.state.lock();
        if guard.destroyed {
            return;
        }
        self.inner.teardown(&mut guard);
    }

    /// Disconnect and discard all subscriptions and queued frames.
    ///
    /// Terminal: every later operation returns [`FeedError::Destroyed`].
    pub fn destroy(&self) {
        let mut guard = self.inner.state.lock();
        let shared = &mut *guard;
        if shared.destroyed {
            return;
        }

        self.inner.teardown(shared);
        shared.registry.clear();
        shared.outbound.clear();
        shared.destroyed = true;
        metrics::set_subscriptions(0);
        info!("Feed client destroyed");
    }

    /// Register a subscription.
    ///
    /// Sends it now when connected; otherwise it goes out on the next
    /// successful connect. Returns `false` if the subscription was already
    /// registered or the request is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was destroyed or the request cannot
    /// be encoded.
    pub fn subscribe(&self, request: SubscriptionRequest) -> Result<bool, FeedError> {
        if request.is_empty() {
            return Ok(false);
        }
        let text = self.inner.codec.encode(&OutboundMessage::subscribe(&request))?;

        let mut guard = self.inner.state.lock();
        let shared = &mut *guard;
        if shared.destroyed {
            return Err(FeedError::Destroyed);
        }

        let key = request.key();
        if !shared.registry.subscribe(request) {
            debug!(key = %key, "Subscription already registered");
            return Ok(false);
        }
        metrics::set_subscriptions(shared.registry.len());

        let sent = Inner::write_if_connected(shared, text);
        info!(key = %key, sent, "Subscription registered");
        Ok(true)
    }

    /// Remove a subscription.
    ///
    /// Returns `false` if it was not registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was destroyed or the request cannot
    /// be encoded.
    pub fn unsubscribe(&self, request: &SubscriptionRequest) -> Result<bool, FeedError> {
        if request.is_empty() {
            return Ok(false);
        }
        let text = self.inner.codec.encode(&OutboundMessage::unsubscribe(request))?;

        let mut guard = self.inner.state.lock();
        let shared = &mut *guard;
        if shared.destroyed {
            return Err(FeedError::Destroyed);
        }

        let key = request.key();
        if !shared.registry.unsubscribe(request) {
            debug!(key = %key, "Unsubscribe for unknown subscription");
            return Ok(false);
        }
        metrics::set_subscriptions(shared.registry.len());

        let sent = Inner::write_if_connected(shared, text);
        info!(key = %key, sent, "Subscription removed");
        Ok(true)
    }

    /// Write a message, or queue it until the next connect.
    ///
    /// The queue is bounded; when full the oldest frame is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was destroyed or the message cannot
    /// be encoded.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), FeedError> {
        let text = self.inner.codec.encode(message)?;

        let mut guard = self.inner.state.lock();
        let shared = &mut *guard;
        if shared.destroyed {
            return Err(FeedError::Destroyed);
        }

        let link = if shared.connection == ConnectionState::Connected {
            shared.link.as_ref()
        } else {
            None
        };
        let text = match link {
            Some(link) => match link.send(OutboundFrame::Text(text)) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(OutboundFrame::Text(text))) => text,
                Err(mpsc::error::SendError(OutboundFrame::Close { .. })) => return Ok(()),
            },
            None => text,
        };

        Inner::enqueue(shared, text);
        Ok(())
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }

    /// Current circuit breaker state.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.inner.state.lock().breaker.state()
    }

    /// Snapshot of message and connection counters.
    #[must_use]
    pub fn metrics(&self) -> FeedMetrics {
        let shared = self.inner.state.lock();
        Inner::snapshot(&shared)
    }

    /// Registered subscriptions in canonical order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionRequest> {
        self.inner.state.lock().registry.requests()
    }

    /// Evaluate client health.
    #[must_use]
    pub fn health_status(&self) -> HealthReport {
        let shared = self.inner.state.lock();
        let stats = shared.router.stats();
        let inputs = HealthInputs {
            connected: shared.connection.is_connected(),
            breaker_closed: shared.breaker.is_closed(),
            average_latency: stats.average_latency(),
            latency_threshold: self.inner.config.latency_threshold,
            message_within_window: stats.received_within(
                Instant::now().into_std(),
                self.inner.config.recent_message_window,
            ),
        };
        HealthReport::evaluate(&inputs, Inner::snapshot(&shared))
    }

    /// Check if `destroy` was called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }
}

impl Inner {
    fn snapshot(shared: &Shared) -> FeedMetrics {
        shared.router.stats().snapshot(
            shared.reconnect.attempt_count(),
            shared.registry.len(),
            shared.outbound.len(),
        )
    }

    fn emit(&self, event: FeedEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }

    fn set_state(shared: &mut Shared, state: ConnectionState) {
        if shared.connection != state {
            debug!(from = %shared.connection, to = %state, "Connection state changed");
            shared.connection = state;
            metrics::set_connection_state(state);
        }
    }

    /// Move to `Connecting` under a fresh epoch.
    fn begin_attempt(&self, shared: &mut Shared) -> (u64, CancellationToken) {
        if let Some(retry) = shared.retry.take() {
            retry.cancel();
        }
        if let Some(session) = shared.session.take() {
            session.cancel();
        }

        shared.epoch += 1;
        let token = CancellationToken::new();
        shared.session = Some(token.clone());

        Self::set_state(shared, ConnectionState::Connecting);
        self.emit(FeedEvent::Connecting);
        info!(
            attempt = shared.reconnect.attempt_count(),
            circuit = %shared.breaker.state(),
            "Connecting to feed"
        );
        (shared.epoch, token)
    }

    fn attempt(
        self: Arc<Self>,
        epoch: u64,
        token: CancellationToken,
    ) -> BoxFuture<'static, Result<(), FeedError>> {
        async move {
            let opened = tokio::select! {
                () = token.cancelled() => return Err(FeedError::Superseded),
                result = timeout(self.config.connect_timeout, self.transport.open(&self.endpoint)) => result,
            };

            match opened {
                Ok(Ok(link)) => self.establish(epoch, &token, link),
                Ok(Err(e)) => {
                    let err = FeedError::Transport(e);
                    self.connect_failed(epoch, &err, "transport");
                    Err(err)
                }
                Err(_) => {
                    let err = FeedError::ConnectTimeout(self.config.connect_timeout);
                    self.connect_failed(epoch, &err, "timeout");
                    Err(err)
                }
            }
        }
        .boxed()
    }

    fn establish(
        self: &Arc<Self>,
        epoch: u64,
        token: &CancellationToken,
        link: TransportLink,
    ) -> Result<(), FeedError> {
        let TransportLink { outbound, inbound } = link;

        let mut guard = self.state.lock();
        let shared = &mut *guard;

        if shared.epoch != epoch || token.is_cancelled() {
            let _ = outbound.send(OutboundFrame::Close {
                code: CLOSE_NORMAL,
                reason: SUPERSEDED_REASON.to_string(),
            });
            return Err(FeedError::Superseded);
        }

        shared.breaker.record_success();
        metrics::set_circuit_state(shared.breaker.state());
        shared.reconnect.reset();
        shared.last_error = None;

        let mut replayed = 0_usize;
        for request in shared.registry.replay() {
            match self.codec.encode(&OutboundMessage::subscribe(request)) {
                Ok(text) => {
                    if outbound.send(OutboundFrame::Text(text)).is_err() {
                        break;
                    }
                    replayed += 1;
                }
                Err(e) => warn!(key = %request.key(), error = %e, "Failed to encode subscription replay"),
            }
        }

        // Frames the link refuses go back on the queue for the next connect.
        let mut pending: VecDeque<String> = shared.outbound.drain().collect();
        let mut flushed = 0_usize;
        while let Some(text) = pending.pop_front() {
            if let Err(mpsc::error::SendError(frame)) = outbound.send(OutboundFrame::Text(text)) {
                if let OutboundFrame::Text(text) = frame {
                    pending.push_front(text);
                }
                break;
            }
            flushed += 1;
        }
        if !pending.is_empty() {
            warn!(requeued = pending.len(), "Link closed while flushing outbound queue");
            for text in pending {
                Self::enqueue(shared, text);
            }
        }

        shared.link = Some(outbound);
        Self::set_state(shared, ConnectionState::Connected);
        self.emit(FeedEvent::Connected);
        info!(replayed, flushed, "Feed connected");
        drop(guard);

        tokio::spawn(Arc::clone(self).run_session(epoch, token.clone(), inbound));
        Ok(())
    }

    async fn run_session(
        self: Arc<Self>,
        epoch: u64,
        token: CancellationToken,
        mut inbound: mpsc::Receiver<TransportEvent>,
    ) {
        let mut heartbeat = HeartbeatMonitor::start(self.config.heartbeat, Instant::now());

        loop {
            tokio::select! {
                biased;

                () = token.cancelled() => return,

                event = inbound.recv() => match event {
                    Some(TransportEvent::Frame(text)) => {
                        let received_at = Instant::now();
                        if self.handle_frame(epoch, &text, received_at) {
                            heartbeat.record_heartbeat(received_at);
                        }
                    }
                    Some(TransportEvent::Closed { code, reason }) => {
                        self.connection_lost(epoch, code, reason, "closed");
                        return;
                    }
                    Some(TransportEvent::Error(e)) => {
                        self.connection_lost(epoch, CLOSE_ABNORMAL, e, "error");
                        return;
                    }
                    None => {
                        self.connection_lost(epoch, CLOSE_ABNORMAL, "transport ended".to_string(), "closed");
                        return;
                    }
                },

                () = sleep_until(heartbeat.deadline()) => {
                    self.heartbeat_expired(epoch, heartbeat.beats());
                    return;
                }
            }
        }
    }

    /// Route one frame. Returns `true` if it was a heartbeat.
    fn handle_frame(&self, epoch: u64, text: &str, received_at: Instant) -> bool {
        let mut guard = self.state.lock();
        let shared = &mut *guard;
        if shared.epoch != epoch {
            return false;
        }

        let Some(heartbeat) = shared.router.route(text, received_at.into_std(), &self.events) else {
            return false;
        };

        if heartbeat.requires_response {
            match self.codec.encode(&OutboundMessage::heartbeat_response()) {
                Ok(reply) => {
                    if let Some(link) = &shared.link {
                        let _ = link.send(OutboundFrame::Text(reply));
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode heartbeat response"),
            }
        }
        true
    }

    fn connection_lost(self: &Arc<Self>, epoch: u64, code: u16, reason: String, cause: &'static str) {
        let mut guard = self.state.lock();
        let shared = &mut *guard;
        if shared.epoch != epoch {
            return;
        }

        warn!(code, reason = %reason, "Feed connection lost");
        self.fail_session(shared, code, reason, cause);
    }

    fn heartbeat_expired(self: &Arc<Self>, epoch: u64, beats: u64) {
        let mut guard = self.state.lock();
        let shared = &mut *guard;
        if shared.epoch != epoch {
            return;
        }

        warn!(
            timeout_secs = self.config.heartbeat.timeout.as_secs(),
            beats,
            "Heartbeat timeout"
        );
        self.emit(FeedEvent::HeartbeatTimeout);
        if let Some(link) = &shared.link {
            let _ = link.send(OutboundFrame::Close {
                code: HEARTBEAT_TIMEOUT_CLOSE_CODE,
                reason: HEARTBEAT_TIMEOUT_REASON.to_string(),
            });
        }
        self.fail_session(
            shared,
            HEARTBEAT_TIMEOUT_CLOSE_CODE,
            HEARTBEAT_TIMEOUT_REASON.to_string(),
            "heartbeat",
        );
    }

    fn fail_session(
        self: &Arc<Self>,
        shared: &mut Shared,
        code: u16,
        reason: String,
        cause: &'static str,
    ) {
        if let Some(session) = shared.session.take() {
            session.cancel();
        }
        shared.link = None;

        shared.breaker.record_failure(Instant::now());
        metrics::set_circuit_state(shared.breaker.state());
        metrics::record_connection_failure(cause);

        shared.last_error = Some(format!("connection closed ({code}): {reason}"));
        self.emit(FeedEvent::Disconnected {
            code,
            reason,
            clean: false,
        });
        self.schedule_retry(shared);
    }

    fn connect_failed(self: &Arc<Self>, epoch: u64, err: &FeedError, cause: &'static str) {
        let mut guard = self.state.lock();
        let shared = &mut *guard;
        if shared.epoch != epoch {
            return;
        }

        if let Some(session) = shared.session.take() {
            session.cancel();
        }
        shared.breaker.record_failure(Instant::now());
        metrics::set_circuit_state(shared.breaker.state());
        metrics::record_connection_failure(cause);

        warn!(
            error = %err,
            failures = shared.breaker.consecutive_failures(),
            "Feed connection attempt failed"
        );
        shared.last_error = Some(err.to_string());
        self.schedule_retry(shared);
    }

    fn schedule_retry(self: &Arc<Self>, shared: &mut Shared) {
        let Some(delay) = shared.reconnect.next_delay() else {
            let attempts = shared.reconnect.attempt_count();
            let error = shared
                .last_error
                .clone()
                .unwrap_or_else(|| "connection lost".to_string());
            error!(attempts, error = %error, "Reconnect attempts exhausted");
            Self::set_state(shared, ConnectionState::Failed);
            self.emit(FeedEvent::Failed { error, attempts });
            return;
        };

        let delay = shared
            .breaker
            .remaining_open(Instant::now())
            .map_or(delay, |wait| delay.max(wait));
        let attempt = shared.reconnect.attempt_count();
        let max_attempts = shared.reconnect.max_attempts();

        metrics::record_reconnect();
        info!(
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );
        Self::set_state(shared, ConnectionState::Reconnecting);
        self.emit(FeedEvent::Reconnecting {
            attempt,
            delay,
            max_attempts,
        });
        self.arm_retry(shared, delay);
    }

    fn arm_retry(self: &Arc<Self>, shared: &mut Shared, delay: Duration) {
        if let Some(previous) = shared.retry.take() {
            previous.cancel();
        }
        shared.epoch += 1;
        let epoch = shared.epoch;
        let token = CancellationToken::new();
        shared.retry = Some(token.clone());

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = sleep(delay) => inner.retry(epoch).await,
            }
        });
    }

    fn retry(self: Arc<Self>, epoch: u64) -> BoxFuture<'static, ()> {
        async move {
            let (attempt_epoch, token) = {
                let mut guard = self.state.lock();
                let shared = &mut *guard;
                if shared.epoch != epoch
                    || shared.destroyed
                    || shared.connection != ConnectionState::Reconnecting
                {
                    return;
                }
                shared.retry = None;

                if let Err(wait) = shared.breaker.try_acquire(Instant::now()) {
                    debug!(
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "Retry deferred by open circuit"
                    );
                    self.arm_retry(shared, wait.max(MIN_DEFERRED_RETRY));
                    return;
                }
                metrics::set_circuit_state(shared.breaker.state());
                self.begin_attempt(shared)
            };

            if let Err(e) = Arc::clone(&self).attempt(attempt_epoch, token).await {
                debug!(error = %e, "Reconnect attempt failed");
            }
        }
        .boxed()
    }

    /// Send `text` when connected. Returns whether it was written.
    fn write_if_connected(shared: &Shared, text: String) -> bool {
        if shared.connection != ConnectionState::Connected {
            return false;
        }
        shared
            .link
            .as_ref()
            .is_some_and(|link| link.send(OutboundFrame::Text(text)).is_ok())
    }

    fn enqueue(shared: &mut Shared, text: String) {
        if let Some(evicted) = shared.outbound.push(text) {
            shared.router.stats_mut().record_outbound_dropped();
            metrics::record_outbound_dropped();
            warn!(
                capacity = shared.outbound.capacity(),
                evicted_bytes = evicted.len(),
                "Outbound queue full, dropped oldest frame"
            );
        }
    }

    /// Cancel everything and move to `Disconnected`.
    fn teardown(&self, shared: &mut Shared) {
        shared.epoch += 1;
        if let Some(retry) = shared.retry.take() {
            retry.cancel();
        }
        if let Some(session) = shared.session.take() {
            session.cancel();
        }
        shared.breaker.release_probe();
        metrics::set_circuit_state(shared.breaker.state());

        if let Some(link) = shared.link.take() {
            let _ = link.send(OutboundFrame::Close {
                code: CLOSE_NORMAL,
                reason: CLIENT_INITIATED_REASON.to_string(),
            });
        }
        shared.reconnect.reset();

        let previous = shared.connection;
        Self::set_state(shared, ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            info!(from = %previous, "Feed disconnected by client");
            self.emit(FeedEvent::Disconnected {
                code: CLOSE_NORMAL,
                reason: CLIENT_INITIATED_REASON.to_string(),
                clean: true,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::UpdateType;
    use crate::infrastructure::transport::{ChannelPeer, ChannelTransport};

    fn client() -> (FeedClient, ChannelPeer) {
        let (transport, peer) = ChannelTransport::pair();
        let config = FeedClientConfig::new("ws://feed.test/stream", "secret");
        let client = FeedClient::new(config, Arc::new(transport)).unwrap();
        (client, peer)
    }

    fn aapl_quotes() -> SubscriptionRequest {
        SubscriptionRequest::new(["AAPL"], [UpdateType::Quotes])
    }

    #[tokio::test]
    async fn connect_is_idempotent_when_connected() {
        let (client, mut peer) = client();

        client.connect().await.unwrap();
        client.connect().await.unwrap();

        assert_eq!(client.connection_state(), ConnectionState::Connected);
        assert_eq!(peer.attempts(), 1);
        assert!(peer.next_connection().await.is_some());
    }

    #[tokio::test]
    async fn endpoint_carries_token() {
        let (client, peer) = client();
        client.connect().await.unwrap();

        let endpoint = &peer.endpoints()[0];
        assert_eq!(endpoint.query(), Some("token=secret"));
    }

    #[tokio::test]
    async fn send_while_disconnected_is_flushed_on_connect() {
        let (client, mut peer) = client();

        client.send(&OutboundMessage::heartbeat_response()).unwrap();
        assert_eq!(client.metrics().queued_outbound, 1);

        client.connect().await.unwrap();
        let mut conn = peer.next_connection().await.unwrap();

        let frames = conn.drain_text();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("HEARTBEAT_RESPONSE"));
        assert_eq!(client.metrics().queued_outbound, 0);
    }

    #[tokio::test]
    async fn subscribe_while_connected_sends_immediately() {
        let (client, mut peer) = client();
        client.connect().await.unwrap();
        let mut conn = peer.next_connection().await.unwrap();

        assert!(client.subscribe(aapl_quotes()).unwrap());
        assert!(!client.subscribe(aapl_quotes()).unwrap());

        let frames = conn.drain_text();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(r#""type":"SUBSCRIBE""#));

        assert!(client.unsubscribe(&aapl_quotes()).unwrap());
        assert!(!client.unsubscribe(&aapl_quotes()).unwrap());
        let frames = conn.drain_text();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(r#""type":"UNSUBSCRIBE""#));
    }

    #[tokio::test]
    async fn empty_subscription_is_ignored() {
        let (client, _peer) = client();
        let empty = SubscriptionRequest::new(Vec::<String>::new(), [UpdateType::Quotes]);

        assert!(!client.subscribe(empty).unwrap());
        assert!(client.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn disconnect_closes_with_normal_code() {
        let (client, mut peer) = client();
        let mut events = client.events();
        client.connect().await.unwrap();
        let mut conn = peer.next_connection().await.unwrap();

        client.disconnect();

        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(
            conn.recv().await,
            Some(OutboundFrame::Close {
                code: CLOSE_NORMAL,
                reason: CLIENT_INITIATED_REASON.to_string(),
            })
        );

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                FeedEvent::Connecting,
                FeedEvent::Connected,
                FeedEvent::Disconnected {
                    code: CLOSE_NORMAL,
                    reason: CLIENT_INITIATED_REASON.to_string(),
                    clean: true,
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_supersedes_pending_connect() {
        let (client, peer) = client();
        peer.hang();

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.connect().await }
        });
        while client.connection_state() != ConnectionState::Connecting {
            tokio::task::yield_now().await;
        }
        assert_eq!(client.connect().await, Err(FeedError::ConnectInProgress));

        client.disconnect();
        assert_eq!(pending.await.unwrap(), Err(FeedError::Superseded));
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn destroyed_client_rejects_operations() {
        let (client, _peer) = client();
        client.subscribe(aapl_quotes()).unwrap();

        client.destroy();

        assert!(client.is_destroyed());
        assert!(client.subscriptions().is_empty());
        assert_eq!(client.connect().await, Err(FeedError::Destroyed));
        assert_eq!(client.subscribe(aapl_quotes()), Err(FeedError::Destroyed));
        assert_eq!(
            client.send(&OutboundMessage::heartbeat_response()),
            Err(FeedError::Destroyed)
        );
    }

    #[tokio::test]
    async fn health_is_degraded_when_idle() {
        let (client, _peer) = client();
        let report = client.health_status();

        assert!(!report.checks.connected);
        assert!(report.checks.breaker_closed);
        assert!(report.checks.low_latency);
        assert!(!report.checks.recent_messages);
        assert_eq!(report.status, crate::application::services::HealthStatus::Degraded);
    }
}
