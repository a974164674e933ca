//! Error types for the board services.

use loretable_protocol::{MapId, TokenId};
use loretable_store::StoreError;

/// Errors that can occur while mutating fog or token state.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// A non-DM attempted a DM-only mutation.
    #[error("only the DM may do that")]
    DmOnly,

    /// The map does not exist — or belongs to a different session,
    /// which callers cannot tell apart.
    #[error("map {0} not found")]
    MapNotFound(MapId),

    /// The token does not exist — or belongs to a different session.
    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    /// The map already has a party token; placement of a second is
    /// rejected, never silently overwritten.
    #[error("map {0} already has a party token")]
    PartyTokenExists(MapId),

    /// A cell from the wrong coordinate family for the map's grid.
    #[error("cell coordinates do not match the map's grid type")]
    WrongGrid,

    /// A malformed token payload (e.g. empty name).
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
