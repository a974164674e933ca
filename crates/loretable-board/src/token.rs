//! Token state service.
//!
//! Positioned markers on a map: the party, NPCs, monsters, generic
//! props. Placement, movement, and removal are DM actions; reads are
//! open to session members. The one invariant everything else leans
//! on: at most one party token per map.

use std::sync::Arc;

use loretable_protocol::{
    Cell, CharacterId, MapId, Role, SessionId, Token, TokenId, TokenImage,
    TokenKind,
};
use loretable_store::{NewToken, RecordStore, StoreError};

use crate::fog::cell_matches_grid;
use crate::locks::MapLocks;
use crate::BoardError;

/// Caller-supplied fields for a new token.
#[derive(Debug, Clone)]
pub struct PlaceToken {
    /// What the token represents.
    pub kind: TokenKind,
    /// Display name.
    pub name: String,
    /// Initial grid position.
    pub position: Cell,
    /// Solid display color.
    pub color: Option<String>,
    /// Image display.
    pub image: Option<TokenImage>,
    /// Optional linked character/NPC/monster record.
    pub character_id: Option<CharacterId>,
}

/// The token service. Cheap to clone; state lives in the store.
pub struct TokenService<S> {
    store: Arc<S>,
    locks: Arc<MapLocks>,
}

impl<S> Clone for TokenService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: RecordStore> TokenService<S> {
    /// Creates a token service over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: Arc::new(MapLocks::new()),
        }
    }

    /// All tokens on a map. Open to any session member.
    pub async fn list(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> Result<Vec<Token>, BoardError> {
        self.checked_map(session_id, map_id).await?;
        Ok(self.store.tokens_on_map(session_id, map_id).await?)
    }

    /// Places a new token; DM-only.
    ///
    /// A second party token on a map that already has one is rejected
    /// and the existing token is left unchanged.
    pub async fn place(
        &self,
        session_id: SessionId,
        map_id: MapId,
        actor: Role,
        spec: PlaceToken,
    ) -> Result<Token, BoardError> {
        if !actor.is_dm() {
            return Err(BoardError::DmOnly);
        }
        let map = self.checked_map(session_id, map_id).await?;
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(BoardError::InvalidToken(
                "name must not be empty".into(),
            ));
        }
        if !cell_matches_grid(&spec.position, map.grid) {
            return Err(BoardError::WrongGrid);
        }

        // The uniqueness check and the insert must see the same token
        // list; serialize against other placements on this map.
        let _guard = self.locks.acquire(session_id, map_id).await;
        if spec.kind == TokenKind::Party {
            let existing =
                self.store.tokens_on_map(session_id, map_id).await?;
            if existing.iter().any(|t| t.kind == TokenKind::Party) {
                return Err(BoardError::PartyTokenExists(map_id));
            }
        }

        let token = self
            .store
            .insert_token(NewToken {
                session_id,
                map_id,
                kind: spec.kind,
                name: name.to_owned(),
                color: spec.color,
                image: spec.image,
                position: spec.position,
                character_id: spec.character_id,
            })
            .await?;
        tracing::debug!(
            %session_id, %map_id, token_id = %token.id,
            kind = ?token.kind, "token placed"
        );
        Ok(token)
    }

    /// Moves a token; DM-only. Returns the token with its new
    /// position.
    pub async fn move_token(
        &self,
        session_id: SessionId,
        actor: Role,
        token_id: TokenId,
        position: Cell,
    ) -> Result<Token, BoardError> {
        if !actor.is_dm() {
            return Err(BoardError::DmOnly);
        }
        let mut token = self.checked_token(session_id, token_id).await?;
        let map = self.checked_map(session_id, token.map_id).await?;
        if !cell_matches_grid(&position, map.grid) {
            return Err(BoardError::WrongGrid);
        }
        self.store.update_token_position(token_id, position).await?;
        token.position = position;
        Ok(token)
    }

    /// Removes a token; DM-only.
    pub async fn remove(
        &self,
        session_id: SessionId,
        actor: Role,
        token_id: TokenId,
    ) -> Result<Token, BoardError> {
        if !actor.is_dm() {
            return Err(BoardError::DmOnly);
        }
        let token = self.checked_token(session_id, token_id).await?;
        self.store.remove_token(token_id).await?;
        tracing::debug!(%session_id, %token_id, "token removed");
        Ok(token)
    }

    /// Loads a token and verifies it belongs to the calling session.
    /// A foreign token id reads as not-found, never leaked.
    async fn checked_token(
        &self,
        session_id: SessionId,
        token_id: TokenId,
    ) -> Result<Token, BoardError> {
        match self.store.token(token_id).await? {
            Some(token) if token.session_id == session_id => Ok(token),
            _ => Err(BoardError::TokenNotFound(token_id)),
        }
    }

    async fn checked_map(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> Result<loretable_store::MapRecord, BoardError> {
        let map = match self.store.map(map_id).await {
            Ok(map) => map,
            Err(StoreError::MapNotFound(id)) => {
                return Err(BoardError::MapNotFound(id));
            }
            Err(e) => return Err(BoardError::Store(e)),
        };
        if map.session_id != session_id {
            return Err(BoardError::MapNotFound(map_id));
        }
        Ok(map)
    }
}
