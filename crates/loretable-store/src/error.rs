//! Error types for the store layer.

use loretable_protocol::{ChannelId, MapId, SessionId, TokenId};

/// Errors that can occur while reading or writing records.
///
/// Not-found variants name only the id the caller already supplied;
/// whether a resource exists in some other session is never revealed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No session with the given id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// No map with the given id.
    #[error("map {0} not found")]
    MapNotFound(MapId),

    /// No channel with the given id.
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    /// No token with the given id.
    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    /// The backing store failed (I/O, connection, constraint).
    #[error("store backend error: {0}")]
    Backend(String),
}
