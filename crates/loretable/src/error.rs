//! Unified error type for the Loretable engine.

use loretable_board::BoardError;
use loretable_chat::ChatError;
use loretable_presence::PresenceError;
use loretable_protocol::ProtocolError;
use loretable_store::StoreError;
use loretable_transport::TransportError;

use crate::identity::IdentityError;
use crate::lifecycle::LifecycleError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `loretable` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LoretableError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A record-store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A presence error (unknown or unreachable recipient).
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A fog or token error.
    #[error(transparent)]
    Board(#[from] BoardError),

    /// A chat error.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// A session lifecycle error (bad status transition, ended
    /// session, non-DM display mutation).
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The identity seam rejected a join token.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}
