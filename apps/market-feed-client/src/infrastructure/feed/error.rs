//! Feed client errors.

use std::time::Duration;

use crate::application::ports::TransportError;
use crate::infrastructure::feed::codec::CodecError;

/// Errors returned by [`FeedClient`](super::FeedClient) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The circuit breaker is open.
    #[error("circuit breaker open; retry in {retry_in:?}")]
    CircuitOpen {
        /// Time left in the open window.
        retry_in: Duration,
    },

    /// The transport did not open within the connect timeout.
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The transport failed to open.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Another connection attempt is in flight.
    #[error("connection attempt already in progress")]
    ConnectInProgress,

    /// A disconnect or newer attempt overtook this one.
    #[error("connection attempt superseded")]
    Superseded,

    /// The client was destroyed.
    #[error("client destroyed")]
    Destroyed,

    /// An outbound message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] CodecError),
}
