//! Error types for the presence layer.

use loretable_protocol::{SessionId, UserId};

/// Errors that can occur during presence operations.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The user has no registered connection in the session.
    #[error("user {user_id} is not connected to session {session_id}")]
    NotConnected {
        /// The session that was addressed.
        session_id: SessionId,
        /// The user that was addressed.
        user_id: UserId,
    },

    /// The user is registered but their writer task is gone; the next
    /// sweep or disconnect will clean the entry up.
    #[error("user {user_id} in session {session_id} is unreachable")]
    Unreachable {
        /// The session that was addressed.
        session_id: SessionId,
        /// The user that was addressed.
        user_id: UserId,
    },
}
