//! Error types for the chat layer.

use loretable_protocol::{ChannelId, UserId};
use loretable_store::StoreError;

/// Errors that can occur during chat operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The channel does not exist — or the caller is not a member,
    /// which reads identically so membership is never leaked.
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    /// A channel needs someone besides its creator.
    #[error("a channel needs at least one participant besides you")]
    EmptyChannel,

    /// A named participant has no participation record in the session.
    #[error("user {0} is not part of this session")]
    NotInSession(UserId),

    /// Empty (after trimming) message content.
    #[error("message content must not be empty")]
    EmptyMessage,

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
