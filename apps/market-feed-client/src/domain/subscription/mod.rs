//! Subscription Registry
//!
//! Domain types for tracking the set of logically active subscriptions,
//! independent of connection state.
//!
//! # Design
//!
//! A subscription is identified by its [`SubscriptionKey`]: a canonical,
//! order-independent serialization of the symbols, update types, throttle
//! interval and depth of a request. Two requests with the same semantic
//! content produce the same key regardless of the order their symbols or
//! types were given in.
//!
//! The registry is what gets replayed after every successful (re)connect,
//! so each registered key is sent upstream exactly once per connection.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// A symbol string (ticker).
pub type Symbol = String;

/// Kind of market data a subscription asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// Top-of-book quotes.
    Quotes,
    /// Trade prints.
    Trades,
    /// Level-2 order book depth.
    Level2,
    /// News items.
    News,
}

impl UpdateType {
    /// Get all update types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Quotes, Self::Trades, Self::Level2, Self::News]
    }

    /// Get the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::Trades => "trades",
            Self::Level2 => "level2",
            Self::News => "news",
        }
    }

    /// Parse an update type from its wire name, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "quotes" | "quote" => Some(Self::Quotes),
            "trades" | "trade" => Some(Self::Trades),
            "level2" | "depth" => Some(Self::Level2),
            "news" => Some(Self::News),
            _ => None,
        }
    }
}

impl std::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Subscription Request
// =============================================================================

/// A request to receive some update types for some symbols.
///
/// Symbols and types are held as sorted sets, so the request itself is
/// already canonical.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use market_feed_client::domain::subscription::{SubscriptionRequest, UpdateType};
///
/// let a = SubscriptionRequest::new(["MSFT", "AAPL"], [UpdateType::Trades, UpdateType::Quotes])
///     .with_throttle(Duration::from_millis(250));
/// let b = SubscriptionRequest::new(["AAPL", "MSFT"], [UpdateType::Quotes, UpdateType::Trades])
///     .with_throttle(Duration::from_millis(250));
///
/// assert_eq!(a.key(), b.key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    /// Symbols, sorted and de-duplicated.
    pub symbols: BTreeSet<Symbol>,
    /// Update types, sorted and de-duplicated.
    pub types: BTreeSet<UpdateType>,
    /// Optional server-side throttle interval in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_ms: Option<u64>,
    /// Optional number of book levels for level-2 subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

impl SubscriptionRequest {
    /// Create a request for the given symbols and update types.
    #[must_use]
    pub fn new<S, T>(symbols: S, types: T) -> Self
    where
        S: IntoIterator,
        S::Item: Into<Symbol>,
        T: IntoIterator<Item = UpdateType>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            types: types.into_iter().collect(),
            throttle_ms: None,
            depth: None,
        }
    }

    /// Set a throttle interval.
    #[must_use]
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle_ms = Some(u64::try_from(throttle.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Set a book depth.
    #[must_use]
    pub const fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Check if the request names no symbols or no types.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() || self.types.is_empty()
    }

    /// Canonical identity of this request.
    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::of(self)
    }
}

// =============================================================================
// Subscription Key
// =============================================================================

/// Canonical identity of a subscription.
///
/// The key is the compact JSON encoding of `{symbols, types, throttleMs,
/// depth}` with both collections sorted. Only those four fields determine
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Compute the key for a request.
    #[must_use]
    pub fn of(request: &SubscriptionRequest) -> Self {
        // BTreeSet serializes in order and struct fields serialize in
        // declaration order, so this encoding is stable.
        let encoded = serde_json::to_string(request).unwrap_or_else(|_| {
            format!(
                "{:?}|{:?}|{:?}|{:?}",
                request.symbols, request.types, request.throttle_ms, request.depth
            )
        });
        Self(encoded)
    }

    /// Borrow the canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// The set of logically active subscriptions.
///
/// `subscribe` and `unsubscribe` are idempotent per key: a duplicate
/// subscribe and an unsubscribe of an unknown key are both no-ops, reported
/// by returning `false`.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    entries: BTreeMap<SubscriptionKey, SubscriptionRequest>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription.
    ///
    /// Returns `true` if the key was not registered before.
    pub fn subscribe(&mut self, request: SubscriptionRequest) -> bool {
        let key = request.key();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, request);
        true
    }

    /// Remove a subscription.
    ///
    /// Returns `true` if the key was registered.
    pub fn unsubscribe(&mut self, request: &SubscriptionRequest) -> bool {
        self.entries.remove(&request.key()).is_some()
    }

    /// Check if a request's key is registered.
    #[must_use]
    pub fn contains(&self, request: &SubscriptionRequest) -> bool {
        self.entries.contains_key(&request.key())
    }

    /// Requests to re-send after a (re)connect, one per key.
    pub fn replay(&self) -> impl Iterator<Item = &SubscriptionRequest> {
        self.entries.values()
    }

    /// Snapshot of all registered requests.
    #[must_use]
    pub fn requests(&self) -> Vec<SubscriptionRequest> {
        self.entries.values().cloned().collect()
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aapl_quotes() -> SubscriptionRequest {
        SubscriptionRequest::new(["AAPL"], [UpdateType::Quotes])
    }

    #[test]
    fn key_ignores_insertion_order() {
        let a = SubscriptionRequest::new(["MSFT", "AAPL"], [UpdateType::Trades, UpdateType::Quotes]);
        let b = SubscriptionRequest::new(["AAPL", "MSFT"], [UpdateType::Quotes, UpdateType::Trades]);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_collapses_duplicates() {
        let a = SubscriptionRequest::new(["AAPL", "AAPL"], [UpdateType::Quotes]);
        assert_eq!(a.key(), aapl_quotes().key());
    }

    #[test]
    fn key_distinguishes_throttle_and_depth() {
        let plain = SubscriptionRequest::new(["AAPL"], [UpdateType::Level2]);
        let deep = plain.clone().with_depth(10);
        let throttled = plain.clone().with_throttle(Duration::from_millis(100));

        assert_ne!(plain.key(), deep.key());
        assert_ne!(plain.key(), throttled.key());
        assert_ne!(deep.key(), throttled.key());
    }

    #[test]
    fn key_is_compact_json() {
        let request = aapl_quotes().with_depth(5);
        assert_eq!(
            request.key().as_str(),
            r#"{"symbols":["AAPL"],"types":["quotes"],"depth":5}"#
        );
    }

    #[test]
    fn duplicate_subscribe_is_noop() {
        let mut registry = SubscriptionRegistry::new();
        assert!(registry.subscribe(aapl_quotes()));
        assert!(!registry.subscribe(aapl_quotes()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unsubscribe_unknown_is_noop() {
        let mut registry = SubscriptionRegistry::new();
        assert!(!registry.unsubscribe(&aapl_quotes()));
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_removes_key() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(aapl_quotes());
        assert!(registry.contains(&aapl_quotes()));

        assert!(registry.unsubscribe(&aapl_quotes()));
        assert!(!registry.contains(&aapl_quotes()));
        assert_eq!(registry.replay().count(), 0);
    }

    #[test]
    fn replay_yields_each_key_once() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(aapl_quotes());
        registry.subscribe(aapl_quotes());
        registry.subscribe(SubscriptionRequest::new(["TSLA"], [UpdateType::Trades]));

        assert_eq!(registry.replay().count(), 2);
        // Replay is not consuming.
        assert_eq!(registry.replay().count(), 2);
    }

    #[test]
    fn update_type_parsing() {
        assert_eq!(
            UpdateType::from_str_case_insensitive("QUOTES"),
            Some(UpdateType::Quotes)
        );
        assert_eq!(
            UpdateType::from_str_case_insensitive(" level2 "),
            Some(UpdateType::Level2)
        );
        assert_eq!(UpdateType::from_str_case_insensitive("bars"), None);
    }

    proptest! {
        #[test]
        fn key_is_permutation_invariant(
            symbols in proptest::collection::vec("[A-Z]{1,5}", 1..8),
            types in proptest::collection::vec(0usize..4, 1..4),
        ) {
            let types: Vec<UpdateType> = types.into_iter().map(|i| UpdateType::all()[i]).collect();
            let mut reversed_symbols = symbols.clone();
            reversed_symbols.reverse();
            let mut reversed_types = types.clone();
            reversed_types.reverse();

            let forward = SubscriptionRequest::new(symbols, types);
            let backward = SubscriptionRequest::new(reversed_symbols, reversed_types);
            prop_assert_eq!(forward.key(), backward.key());
        }
    }
}
