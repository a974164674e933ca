//! The identity seam.
//!
//! Loretable never authenticates anyone itself: the hosting platform
//! owns accounts, campaign membership, and who is DM of what. The
//! engine hands the opaque token from the `session:join` frame to an
//! [`IdentityResolver`] and trusts whatever comes back.

use std::collections::HashMap;

use loretable_protocol::{CharacterId, Role, SessionId, UserId};

/// A resolved join: who the connection belongs to and how they appear
/// to the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The user behind the token.
    pub user_id: UserId,
    /// DM or player, for this session.
    pub role: Role,
    /// Name shown in rosters and chat.
    pub display_name: String,
    /// Avatar URL, if set.
    pub avatar: Option<String>,
    /// Bound character record (players only).
    pub character_id: Option<CharacterId>,
    /// Bound character's name (players only).
    pub character_name: Option<String>,
}

/// Why a join token was rejected.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The token is invalid, expired, or not valid for the session.
    #[error("identity rejected: {0}")]
    Rejected(String),
}

/// Resolves a join token to an [`Identity`].
///
/// Implement this against your platform's auth. The `session_id` is
/// passed so resolvers can scope tokens to a single session. The
/// returned future must be `Send`: resolution runs inside spawned
/// per-connection tasks.
pub trait IdentityResolver: Send + Sync + 'static {
    /// Resolves `token` for a join of `session_id`.
    fn resolve(
        &self,
        session_id: SessionId,
        token: &str,
    ) -> impl Future<Output = Result<Identity, IdentityError>> + Send;
}

/// A resolver backed by a fixed token table.
///
/// For the dev server and tests only: every token works for every
/// session, and unknown tokens are rejected.
#[derive(Default)]
pub struct StaticTokenResolver {
    identities: HashMap<String, Identity>,
}

impl StaticTokenResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity under a token, replacing any previous
    /// entry.
    pub fn insert(&mut self, token: &str, identity: Identity) {
        self.identities.insert(token.to_owned(), identity);
    }
}

impl IdentityResolver for StaticTokenResolver {
    async fn resolve(
        &self,
        _session_id: SessionId,
        token: &str,
    ) -> Result<Identity, IdentityError> {
        self.identities
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("unknown token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asha() -> Identity {
        Identity {
            user_id: UserId(2),
            role: Role::Player,
            display_name: "Asha".into(),
            avatar: None,
            character_id: Some(CharacterId(7)),
            character_name: Some("Vex".into()),
        }
    }

    #[tokio::test]
    async fn test_static_resolver_matches_token() {
        let mut resolver = StaticTokenResolver::new();
        resolver.insert("asha-token", asha());

        let identity = resolver
            .resolve(SessionId(1), "asha-token")
            .await
            .unwrap();
        assert_eq!(identity, asha());
    }

    #[tokio::test]
    async fn test_resolution_runs_on_a_spawned_task() {
        // The handler resolves tokens inside `tokio::spawn`ed
        // per-connection tasks, so the resolve future has to be Send.
        let mut resolver = StaticTokenResolver::new();
        resolver.insert("asha-token", asha());
        let resolver = std::sync::Arc::new(resolver);

        let handle = tokio::spawn(async move {
            resolver.resolve(SessionId(1), "asha-token").await
        });
        let identity = handle.await.unwrap().unwrap();
        assert_eq!(identity, asha());
    }

    #[tokio::test]
    async fn test_static_resolver_rejects_unknown_token() {
        let resolver = StaticTokenResolver::new();
        let result = resolver.resolve(SessionId(1), "who-dis").await;
        assert!(matches!(result, Err(IdentityError::Rejected(_))));
    }
}
