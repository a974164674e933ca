//! In-memory [`RecordStore`] used by the dev server and tests.
//!
//! One mutex around the whole dataset. That also satisfies the
//! per-map write-serialization requirement for fog and tokens: two DM
//! actions on the same map cannot interleave their read-modify-write.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use loretable_protocol::{
    Cell, ChannelId, ChatMessage, GridKind, MapId, MessageId, SessionId,
    SessionStatus, Token, TokenId, UserId,
};

use crate::records::{
    ChannelRecord, MapRecord, MessagePage, NewMessage, NewToken,
    ParticipationRecord, SessionRecord,
};
use crate::store::{RecordStore, now_ms};
use crate::StoreError;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionRecord>,
    maps: HashMap<MapId, MapRecord>,
    participation: HashMap<(SessionId, UserId), ParticipationRecord>,
    fog: HashMap<(SessionId, MapId), HashSet<Cell>>,
    tokens: HashMap<TokenId, Token>,
    channels: HashMap<ChannelId, ChannelRecord>,
    messages: HashMap<ChannelId, Vec<ChatMessage>>,
    next_session_id: u64,
    next_map_id: u64,
    next_token_id: u64,
    next_channel_id: u64,
    next_message_id: u64,
}

impl Inner {
    fn alloc(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }
}

/// An in-memory record store.
///
/// Nothing survives a process restart, which is exactly the durability
/// a development server needs and exactly what integration tests want.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Seeding helpers (not part of the RecordStore contract) ---------

    /// Creates a session owned by `dm_user_id`, along with its main
    /// channel (the DM is the first member).
    pub async fn create_session(
        &self,
        name: &str,
        dm_user_id: UserId,
    ) -> SessionRecord {
        let mut inner = self.inner.lock().await;
        let id = SessionId(Inner::alloc(&mut inner.next_session_id));
        let now = now_ms();
        let record = SessionRecord {
            id,
            name: name.to_owned(),
            status: SessionStatus::Forming,
            dm_user_id,
            active_map_id: None,
            active_backdrop_id: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        inner.sessions.insert(id, record.clone());

        let channel_id =
            ChannelId(Inner::alloc(&mut inner.next_channel_id));
        inner.channels.insert(
            channel_id,
            ChannelRecord {
                id: channel_id,
                session_id: id,
                name: None,
                is_main: true,
                members: HashMap::from([(dm_user_id, 0)]),
            },
        );
        tracing::debug!(%id, %channel_id, "session created");
        record
    }

    /// Creates a map within a session.
    pub async fn create_map(
        &self,
        session_id: SessionId,
        name: &str,
        grid: GridKind,
        width: u32,
        height: u32,
    ) -> MapRecord {
        let mut inner = self.inner.lock().await;
        let id = MapId(Inner::alloc(&mut inner.next_map_id));
        let record = MapRecord {
            id,
            session_id,
            name: name.to_owned(),
            grid,
            width,
            height,
        };
        inner.maps.insert(id, record.clone());
        record
    }
}

impl RecordStore for MemoryStore {
    async fn session(
        &self,
        id: SessionId,
    ) -> Result<SessionRecord, StoreError> {
        self.inner
            .lock()
            .await
            .sessions
            .get(&id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(id))
    }

    async fn update_session(
        &self,
        record: SessionRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.sessions.contains_key(&record.id) {
            return Err(StoreError::SessionNotFound(record.id));
        }
        inner.sessions.insert(record.id, record);
        Ok(())
    }

    async fn map(&self, id: MapId) -> Result<MapRecord, StoreError> {
        self.inner
            .lock()
            .await
            .maps
            .get(&id)
            .cloned()
            .ok_or(StoreError::MapNotFound(id))
    }

    async fn participation(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<Option<ParticipationRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .participation
            .get(&(session_id, user_id))
            .cloned())
    }

    async fn upsert_participation(
        &self,
        record: ParticipationRecord,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .participation
            .insert((record.session_id, record.user_id), record);
        Ok(())
    }

    async fn participants(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ParticipationRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .participation
            .values()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn fog_cells(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> Result<HashSet<Cell>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .fog
            .get(&(session_id, map_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_fog_cells(
        &self,
        session_id: SessionId,
        map_id: MapId,
        cells: HashSet<Cell>,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .fog
            .insert((session_id, map_id), cells);
        Ok(())
    }

    async fn tokens_on_map(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> Result<Vec<Token>, StoreError> {
        let mut tokens: Vec<Token> = self
            .inner
            .lock()
            .await
            .tokens
            .values()
            .filter(|t| t.session_id == session_id && t.map_id == map_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.id);
        Ok(tokens)
    }

    async fn token(
        &self,
        id: TokenId,
    ) -> Result<Option<Token>, StoreError> {
        Ok(self.inner.lock().await.tokens.get(&id).cloned())
    }

    async fn insert_token(
        &self,
        new: NewToken,
    ) -> Result<Token, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = TokenId(Inner::alloc(&mut inner.next_token_id));
        let token = Token {
            id,
            session_id: new.session_id,
            map_id: new.map_id,
            kind: new.kind,
            name: new.name,
            color: new.color,
            image: new.image,
            position: new.position,
            character_id: new.character_id,
        };
        inner.tokens.insert(id, token.clone());
        Ok(token)
    }

    async fn update_token_position(
        &self,
        id: TokenId,
        position: Cell,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let token = inner
            .tokens
            .get_mut(&id)
            .ok_or(StoreError::TokenNotFound(id))?;
        token.position = position;
        Ok(())
    }

    async fn remove_token(&self, id: TokenId) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .tokens
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::TokenNotFound(id))
    }

    async fn channel(
        &self,
        id: ChannelId,
    ) -> Result<Option<ChannelRecord>, StoreError> {
        Ok(self.inner.lock().await.channels.get(&id).cloned())
    }

    async fn channels_in_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ChannelRecord>, StoreError> {
        let mut channels: Vec<ChannelRecord> = self
            .inner
            .lock()
            .await
            .channels
            .values()
            .filter(|c| c.session_id == session_id)
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn main_channel(
        &self,
        session_id: SessionId,
    ) -> Result<ChannelRecord, StoreError> {
        self.inner
            .lock()
            .await
            .channels
            .values()
            .find(|c| c.session_id == session_id && c.is_main)
            .cloned()
            .ok_or(StoreError::SessionNotFound(session_id))
    }

    async fn create_channel(
        &self,
        session_id: SessionId,
        name: Option<String>,
        is_main: bool,
        members: Vec<UserId>,
    ) -> Result<ChannelRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = ChannelId(Inner::alloc(&mut inner.next_channel_id));
        let record = ChannelRecord {
            id,
            session_id,
            name,
            is_main,
            members: members.into_iter().map(|u| (u, 0)).collect(),
        };
        inner.channels.insert(id, record.clone());
        Ok(record)
    }

    async fn add_channel_member(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let channel = inner
            .channels
            .get_mut(&channel_id)
            .ok_or(StoreError::ChannelNotFound(channel_id))?;
        channel.members.entry(user_id).or_insert(0);
        Ok(())
    }

    async fn remove_channel_member(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let channel = inner
            .channels
            .get_mut(&channel_id)
            .ok_or(StoreError::ChannelNotFound(channel_id))?;
        channel.members.remove(&user_id);
        Ok(())
    }

    async fn set_last_read(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        at_ms: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let channel = inner
            .channels
            .get_mut(&channel_id)
            .ok_or(StoreError::ChannelNotFound(channel_id))?;
        channel.members.insert(user_id, at_ms);
        Ok(())
    }

    async fn append_message(
        &self,
        new: NewMessage,
    ) -> Result<ChatMessage, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.channels.contains_key(&new.channel_id) {
            return Err(StoreError::ChannelNotFound(new.channel_id));
        }
        let id = MessageId(Inner::alloc(&mut inner.next_message_id));
        let message = ChatMessage {
            id,
            channel_id: new.channel_id,
            sender_id: new.sender_id,
            kind: new.kind,
            content: new.content,
            dice: new.dice,
            sent_at_ms: now_ms(),
        };
        inner
            .messages
            .entry(new.channel_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn messages_before(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<MessagePage, StoreError> {
        let inner = self.inner.lock().await;
        let all = inner.messages.get(&channel_id);
        let eligible: Vec<ChatMessage> = all
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| before.is_none_or(|b| m.id < b))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let has_more = eligible.len() > limit;
        let start = eligible.len().saturating_sub(limit);
        Ok(MessagePage {
            messages: eligible[start..].to_vec(),
            has_more,
        })
    }

    async fn count_messages_newer(
        &self,
        channel_id: ChannelId,
        after_ms: u64,
        exclude: UserId,
    ) -> Result<usize, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .get(&channel_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| {
                        m.sent_at_ms > after_ms && m.sender_id != exclude
                    })
                    .count()
            })
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loretable_protocol::{MessageKind, TokenKind};

    fn text_message(channel_id: ChannelId, sender: UserId) -> NewMessage {
        NewMessage {
            channel_id,
            sender_id: sender,
            kind: MessageKind::Text,
            content: "hail and well met".into(),
            dice: None,
        }
    }

    #[tokio::test]
    async fn test_create_session_creates_main_channel_with_dm() {
        let store = MemoryStore::new();
        let session = store.create_session("The Sunken Keep", UserId(1)).await;

        let main = store.main_channel(session.id).await.unwrap();
        assert!(main.is_main);
        assert_eq!(main.member_ids(), vec![UserId(1)]);
        assert_eq!(session.status, SessionStatus::Forming);
    }

    #[tokio::test]
    async fn test_fog_cells_default_empty_and_replace() {
        let store = MemoryStore::new();
        let session = store.create_session("s", UserId(1)).await;
        let map = store
            .create_map(session.id, "m", GridKind::Square, 4, 4)
            .await;

        assert!(store.fog_cells(session.id, map.id).await.unwrap().is_empty());

        let cells: HashSet<Cell> =
            [Cell::Square { col: 0, row: 0 }].into_iter().collect();
        store
            .replace_fog_cells(session.id, map.id, cells.clone())
            .await
            .unwrap();
        assert_eq!(store.fog_cells(session.id, map.id).await.unwrap(), cells);
    }

    #[tokio::test]
    async fn test_token_ids_are_monotonic() {
        let store = MemoryStore::new();
        let session = store.create_session("s", UserId(1)).await;
        let map = store
            .create_map(session.id, "m", GridKind::Square, 4, 4)
            .await;

        let new = |name: &str| NewToken {
            session_id: session.id,
            map_id: map.id,
            kind: TokenKind::Generic,
            name: name.into(),
            color: None,
            image: None,
            position: Cell::Square { col: 0, row: 0 },
            character_id: None,
        };
        let a = store.insert_token(new("a")).await.unwrap();
        let b = store.insert_token(new("b")).await.unwrap();
        assert!(a.id < b.id);
    }

    #[tokio::test]
    async fn test_remove_missing_token_is_not_found() {
        let store = MemoryStore::new();
        let result = store.remove_token(TokenId(99)).await;
        assert!(matches!(result, Err(StoreError::TokenNotFound(_))));
    }

    #[tokio::test]
    async fn test_message_pagination_newest_page_and_has_more() {
        let store = MemoryStore::new();
        let session = store.create_session("s", UserId(1)).await;
        let main = store.main_channel(session.id).await.unwrap();

        for _ in 0..5 {
            store
                .append_message(text_message(main.id, UserId(1)))
                .await
                .unwrap();
        }

        let page = store.messages_before(main.id, None, 3).await.unwrap();
        assert_eq!(page.messages.len(), 3);
        assert!(page.has_more);
        // Oldest first within the page.
        assert!(page.messages[0].id < page.messages[2].id);

        // Page older than the current oldest-in-page.
        let before = page.messages[0].id;
        let older = store
            .messages_before(main.id, Some(before), 3)
            .await
            .unwrap();
        assert_eq!(older.messages.len(), 2);
        assert!(!older.has_more);
        assert!(older.messages.iter().all(|m| m.id < before));
    }

    #[tokio::test]
    async fn test_count_messages_newer_excludes_author() {
        let store = MemoryStore::new();
        let session = store.create_session("s", UserId(1)).await;
        let main = store.main_channel(session.id).await.unwrap();

        store
            .append_message(text_message(main.id, UserId(1)))
            .await
            .unwrap();
        store
            .append_message(text_message(main.id, UserId(2)))
            .await
            .unwrap();

        let unread =
            store.count_messages_newer(main.id, 0, UserId(1)).await.unwrap();
        assert_eq!(unread, 1);
    }
}
