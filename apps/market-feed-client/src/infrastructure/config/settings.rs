//! Feed Client Configuration Settings
//!
//! Configuration types for the feed client, loaded from environment variables.

use std::time::Duration;

use url::Url;

use crate::domain::metrics::DEFAULT_LATENCY_WINDOW;
use crate::domain::subscription::UpdateType;
use crate::infrastructure::feed::circuit_breaker::CircuitBreakerConfig;
use crate::infrastructure::feed::heartbeat::HeartbeatConfig;
use crate::infrastructure::feed::outbound::DEFAULT_OUTBOUND_CAPACITY;
use crate::infrastructure::feed::reconnect::ReconnectConfig;

/// Query parameter carrying the access token.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Feed access token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Get the token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Feed client settings.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Feed endpoint, without the token.
    pub url: String,
    /// Access token appended to the endpoint.
    pub access_token: AccessToken,
    /// Bound on one transport open.
    pub connect_timeout: Duration,
    /// Retry backoff and budget.
    pub reconnect: ReconnectConfig,
    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Heartbeat timeout.
    pub heartbeat: HeartbeatConfig,
    /// Frames held while disconnected.
    pub outbound_queue_capacity: usize,
    /// Latency samples kept for the moving average.
    pub latency_window: usize,
    /// Average latency at or above which health degrades.
    pub latency_threshold: Duration,
    /// How recent the last message must be to count as flowing.
    pub recent_message_window: Duration,
    /// Broadcast buffer per event receiver.
    pub event_capacity: usize,
}

impl FeedClientConfig {
    /// Default connect timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default latency threshold.
    pub const DEFAULT_LATENCY_THRESHOLD: Duration = Duration::from_millis(100);
    /// Default recent-message window.
    pub const DEFAULT_RECENT_MESSAGE_WINDOW: Duration = Duration::from_secs(30);
    /// Default event buffer.
    pub const DEFAULT_EVENT_CAPACITY: usize = 4096;

    /// Create settings with defaults for everything but the endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: AccessToken::new(access_token.into()),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            outbound_queue_capacity: DEFAULT_OUTBOUND_CAPACITY,
            latency_window: DEFAULT_LATENCY_WINDOW,
            latency_threshold: Self::DEFAULT_LATENCY_THRESHOLD,
            recent_message_window: Self::DEFAULT_RECENT_MESSAGE_WINDOW,
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from a key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `FEED_URL` or `FEED_ACCESS_TOKEN` is missing or
    /// empty, or the URL does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = required(&lookup, "FEED_URL")?;
        let token = required(&lookup, "FEED_ACCESS_TOKEN")?;

        let mut config = Self::new(url, token);

        config.connect_timeout =
            parse_duration_secs(&lookup, "FEED_CONNECT_TIMEOUT_SECS", config.connect_timeout);

        config.reconnect.base_delay = parse_duration_millis(
            &lookup,
            "FEED_RECONNECT_BASE_DELAY_MS",
            config.reconnect.base_delay,
        );
        config.reconnect.max_delay = parse_duration_secs(
            &lookup,
            "FEED_RECONNECT_MAX_DELAY_SECS",
            config.reconnect.max_delay,
        );
        config.reconnect.max_attempts = parse_or(
            &lookup,
            "FEED_MAX_RECONNECT_ATTEMPTS",
            config.reconnect.max_attempts,
        );

        config.circuit_breaker.failure_threshold = parse_or(
            &lookup,
            "FEED_BREAKER_FAILURE_THRESHOLD",
            config.circuit_breaker.failure_threshold,
        );
        config.circuit_breaker.reset_timeout = parse_duration_secs(
            &lookup,
            "FEED_BREAKER_RESET_SECS",
            config.circuit_breaker.reset_timeout,
        );

        config.heartbeat.timeout = parse_duration_secs(
            &lookup,
            "FEED_HEARTBEAT_TIMEOUT_SECS",
            config.heartbeat.timeout,
        );

        config.outbound_queue_capacity = parse_or(
            &lookup,
            "FEED_OUTBOUND_QUEUE_CAPACITY",
            config.outbound_queue_capacity,
        );
        config.recent_message_window = parse_duration_secs(
            &lookup,
            "FEED_RECENT_MESSAGE_WINDOW_SECS",
            config.recent_message_window,
        );

        config.endpoint()?;
        Ok(config)
    }

    /// Endpoint URL with the token appended as a query parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` does not parse.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let mut url =
            Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl(format!("{}: {e}", self.url)))?;
        url.query_pairs_mut()
            .append_pair(TOKEN_QUERY_PARAM, self.access_token.expose());
        Ok(url)
    }
}

/// Health server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete binary configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Feed client settings.
    pub feed: FeedClientConfig,
    /// Health server settings.
    pub server: ServerSettings,
    /// Symbols to subscribe at startup.
    pub symbols: Vec<String>,
    /// Update types to subscribe at startup.
    pub update_types: Vec<UpdateType>,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from a key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed settings are invalid or
    /// `FEED_UPDATE_TYPES` names an unknown type.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let feed = FeedClientConfig::from_lookup(&lookup)?;

        let server = ServerSettings {
            health_port: parse_or(&lookup, "FEED_HEALTH_PORT", ServerSettings::default().health_port),
        };

        let symbols = lookup("FEED_SYMBOLS")
            .map(|raw| split_list(&raw).map(str::to_uppercase).collect())
            .unwrap_or_default();

        let update_types = match lookup("FEED_UPDATE_TYPES") {
            Some(raw) => split_list(&raw)
                .map(|s| {
                    UpdateType::from_str_case_insensitive(s)
                        .ok_or_else(|| ConfigError::InvalidValue {
                            key: "FEED_UPDATE_TYPES".to_string(),
                            value: s.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![UpdateType::Quotes, UpdateType::Trades],
        };

        Ok(Self {
            feed,
            server,
            symbols,
            update_types,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Endpoint URL does not parse.
    #[error("invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Environment variable has a value that cannot be used.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = FeedClientConfig::new("wss://feed.example.com/stream", "secret");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect.base_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout, Duration::from_secs(60));
        assert_eq!(config.heartbeat.timeout, Duration::from_secs(30));
        assert_eq!(config.outbound_queue_capacity, 100);
        assert_eq!(config.latency_window, 100);
        assert_eq!(config.latency_threshold, Duration::from_millis(100));
    }

    #[test]
    fn endpoint_appends_token() {
        let config = FeedClientConfig::new("wss://feed.example.com/stream?v=2", "a b");
        let endpoint = config.endpoint().unwrap();
        assert_eq!(
            endpoint.as_str(),
            "wss://feed.example.com/stream?v=2&token=a+b"
        );
    }

    #[test]
    fn endpoint_rejects_garbage() {
        let config = FeedClientConfig::new("not a url", "t");
        assert!(matches!(config.endpoint(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn token_redacted_debug() {
        let config = FeedClientConfig::new("wss://feed.example.com", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn from_lookup_requires_url_and_token() {
        assert_eq!(
            FeedClientConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::MissingEnvVar("FEED_URL".to_string())
        );
        assert_eq!(
            FeedClientConfig::from_lookup(lookup(&[
                ("FEED_URL", "wss://feed.example.com"),
                ("FEED_ACCESS_TOKEN", "  "),
            ]))
            .unwrap_err(),
            ConfigError::EmptyValue("FEED_ACCESS_TOKEN".to_string())
        );
    }

    #[test]
    fn from_lookup_overrides() {
        let config = FeedClientConfig::from_lookup(lookup(&[
            ("FEED_URL", "wss://feed.example.com"),
            ("FEED_ACCESS_TOKEN", "t"),
            ("FEED_CONNECT_TIMEOUT_SECS", "3"),
            ("FEED_RECONNECT_BASE_DELAY_MS", "250"),
            ("FEED_MAX_RECONNECT_ATTEMPTS", "4"),
            ("FEED_BREAKER_FAILURE_THRESHOLD", "2"),
            ("FEED_HEARTBEAT_TIMEOUT_SECS", "not-a-number"),
        ]))
        .unwrap();

        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_attempts, 4);
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        // Unparseable values fall back to the default.
        assert_eq!(config.heartbeat.timeout, Duration::from_secs(30));
    }

    #[test]
    fn app_config_lists() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FEED_URL", "wss://feed.example.com"),
            ("FEED_ACCESS_TOKEN", "t"),
            ("FEED_SYMBOLS", "aapl, msft,,"),
            ("FEED_UPDATE_TYPES", "quotes,level2"),
        ]))
        .unwrap();

        assert_eq!(config.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(config.update_types, vec![UpdateType::Quotes, UpdateType::Level2]);
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn app_config_rejects_unknown_type() {
        let err = AppConfig::from_lookup(lookup(&[
            ("FEED_URL", "wss://feed.example.com"),
            ("FEED_ACCESS_TOKEN", "t"),
            ("FEED_UPDATE_TYPES", "quotes,bars"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
