//! Market Feed Client Binary
//!
//! Connects to the configured feed, subscribes the configured symbols and
//! serves health and metrics until shut down.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-feed-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `FEED_URL`: Feed endpoint (`ws://` or `wss://`)
//! - `FEED_ACCESS_TOKEN`: Access token appended as the `token` query parameter
//!
//! ## Optional
//! - `FEED_SYMBOLS`: Comma-separated symbols to subscribe at startup
//! - `FEED_UPDATE_TYPES`: Comma-separated update types (default: quotes,trades)
//! - `FEED_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `FEED_CONNECT_TIMEOUT_SECS`: Connect timeout (default: 10)
//! - `FEED_RECONNECT_BASE_DELAY_MS`: Backoff base delay (default: 1000)
//! - `FEED_RECONNECT_MAX_DELAY_SECS`: Backoff cap (default: 30)
//! - `FEED_MAX_RECONNECT_ATTEMPTS`: Retry budget (default: 10)
//! - `FEED_BREAKER_FAILURE_THRESHOLD`: Failures that open the breaker (default: 5)
//! - `FEED_BREAKER_RESET_SECS`: Breaker reset window (default: 60)
//! - `FEED_HEARTBEAT_TIMEOUT_SECS`: Heartbeat timeout (default: 30)
//! - `FEED_OUTBOUND_QUEUE_CAPACITY`: Offline outbound queue size (default: 100)
//! - `FEED_RECENT_MESSAGE_WINDOW_SECS`: Recent-traffic health window (default: 30)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: market-feed-client)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use market_feed_client::infrastructure::telemetry;
use market_feed_client::{
    AppConfig, FeedClient, FeedError, FeedEvent, HealthServer, HealthServerState,
    SubscriptionRequest, WebSocketTransport, init_metrics,
};
use tokio::signal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting market feed client");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    let config = AppConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let client = FeedClient::new(config.feed.clone(), Arc::new(WebSocketTransport::new()))
        .context("failed to create feed client")?;

    // Log client events
    let events = client.events();
    let events_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        log_events(events, events_shutdown).await;
    });

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        client.clone(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Register startup subscriptions; they go out once connected
    if !config.symbols.is_empty() {
        let request = SubscriptionRequest::new(
            config.symbols.iter().cloned(),
            config.update_types.iter().copied(),
        );
        client.subscribe(request)?;
    }

    match client.connect().await {
        Ok(()) => tracing::info!("Feed client ready"),
        Err(e @ FeedError::CircuitOpen { .. }) => return Err(e.into()),
        Err(e) => tracing::warn!(error = %e, "Initial connect failed, retrying in background"),
    }

    await_shutdown(shutdown_token).await;

    client.destroy();
    tracing::info!("Market feed client stopped");
    Ok(())
}

/// Log lifecycle and error events until shutdown.
async fn log_events(mut events: broadcast::Receiver<FeedEvent>, shutdown: CancellationToken) {
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => return,
            event = events.recv() => event,
        };

        match event {
            Ok(FeedEvent::Reconnecting {
                attempt,
                delay,
                max_attempts,
            }) => {
                tracing::info!(attempt, max_attempts, delay_ms = delay.as_millis(), "Feed reconnecting");
            }
            Ok(FeedEvent::Failed { error, attempts }) => {
                tracing::error!(error = %error, attempts, "Feed failed; restart or reconnect required");
            }
            Ok(FeedEvent::ServerError { code, message }) => {
                tracing::warn!(code = ?code, message = %message, "Feed server error");
            }
            Ok(FeedEvent::SubscriptionAck {
                symbols,
                types,
                success,
            }) => {
                tracing::info!(?symbols, ?types, success, "Subscription acknowledged");
            }
            Ok(FeedEvent::MarketData(update)) => {
                tracing::trace!(kind = update.kind(), symbol = ?update.symbol(), "Market data");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        url = %config.feed.url,
        health_port = config.server.health_port,
        symbols = config.symbols.len(),
        "Configuration loaded"
    );
    tracing::debug!(
        connect_timeout_secs = config.feed.connect_timeout.as_secs(),
        max_attempts = config.feed.reconnect.max_attempts,
        breaker_threshold = config.feed.circuit_breaker.failure_threshold,
        heartbeat_timeout_secs = config.feed.heartbeat.timeout.as_secs(),
        "Feed settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
