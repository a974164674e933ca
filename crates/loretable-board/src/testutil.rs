//! Test support: a delegating store that suspends after its board
//! reads, so interleavings where two writers work from the same stale
//! read are reproducible under `tokio::join!`.

use std::collections::HashSet;

use loretable_protocol::{
    Cell, ChannelId, ChatMessage, MapId, MessageId, SessionId, Token,
    TokenId, UserId,
};
use loretable_store::{
    ChannelRecord, MapRecord, MemoryStore, MessagePage, NewMessage,
    NewToken, ParticipationRecord, RecordStore, SessionRecord,
    StoreError,
};

/// A [`MemoryStore`] whose `fog_cells` and `tokens_on_map` yield after
/// reading. Everything else delegates untouched.
pub(crate) struct YieldingStore {
    pub(crate) inner: MemoryStore,
}

impl YieldingStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
        }
    }
}

impl RecordStore for YieldingStore {
    async fn session(
        &self,
        id: SessionId,
    ) -> Result<SessionRecord, StoreError> {
        self.inner.session(id).await
    }

    async fn update_session(
        &self,
        record: SessionRecord,
    ) -> Result<(), StoreError> {
        self.inner.update_session(record).await
    }

    async fn map(&self, id: MapId) -> Result<MapRecord, StoreError> {
        self.inner.map(id).await
    }

    async fn participation(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<Option<ParticipationRecord>, StoreError> {
        self.inner.participation(session_id, user_id).await
    }

    async fn upsert_participation(
        &self,
        record: ParticipationRecord,
    ) -> Result<(), StoreError> {
        self.inner.upsert_participation(record).await
    }

    async fn participants(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ParticipationRecord>, StoreError> {
        self.inner.participants(session_id).await
    }

    async fn fog_cells(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> Result<HashSet<Cell>, StoreError> {
        let cells = self.inner.fog_cells(session_id, map_id).await;
        tokio::task::yield_now().await;
        cells
    }

    async fn replace_fog_cells(
        &self,
        session_id: SessionId,
        map_id: MapId,
        cells: HashSet<Cell>,
    ) -> Result<(), StoreError> {
        self.inner
            .replace_fog_cells(session_id, map_id, cells)
            .await
    }

    async fn tokens_on_map(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> Result<Vec<Token>, StoreError> {
        let tokens = self.inner.tokens_on_map(session_id, map_id).await;
        tokio::task::yield_now().await;
        tokens
    }

    async fn token(
        &self,
        id: TokenId,
    ) -> Result<Option<Token>, StoreError> {
        self.inner.token(id).await
    }

    async fn insert_token(
        &self,
        new: NewToken,
    ) -> Result<Token, StoreError> {
        self.inner.insert_token(new).await
    }

    async fn update_token_position(
        &self,
        id: TokenId,
        position: Cell,
    ) -> Result<(), StoreError> {
        self.inner.update_token_position(id, position).await
    }

    async fn remove_token(&self, id: TokenId) -> Result<(), StoreError> {
        self.inner.remove_token(id).await
    }

    async fn channel(
        &self,
        id: ChannelId,
    ) -> Result<Option<ChannelRecord>, StoreError> {
        self.inner.channel(id).await
    }

    async fn channels_in_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ChannelRecord>, StoreError> {
        self.inner.channels_in_session(session_id).await
    }

    async fn main_channel(
        &self,
        session_id: SessionId,
    ) -> Result<ChannelRecord, StoreError> {
        self.inner.main_channel(session_id).await
    }

    async fn create_channel(
        &self,
        session_id: SessionId,
        name: Option<String>,
        is_main: bool,
        members: Vec<UserId>,
    ) -> Result<ChannelRecord, StoreError> {
        self.inner
            .create_channel(session_id, name, is_main, members)
            .await
    }

    async fn add_channel_member(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        self.inner.add_channel_member(channel_id, user_id).await
    }

    async fn remove_channel_member(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        self.inner.remove_channel_member(channel_id, user_id).await
    }

    async fn set_last_read(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        at_ms: u64,
    ) -> Result<(), StoreError> {
        self.inner.set_last_read(channel_id, user_id, at_ms).await
    }

    async fn append_message(
        &self,
        new: NewMessage,
    ) -> Result<ChatMessage, StoreError> {
        self.inner.append_message(new).await
    }

    async fn messages_before(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<MessagePage, StoreError> {
        self.inner.messages_before(channel_id, before, limit).await
    }

    async fn count_messages_newer(
        &self,
        channel_id: ChannelId,
        after_ms: u64,
        exclude: UserId,
    ) -> Result<usize, StoreError> {
        self.inner
            .count_messages_newer(channel_id, after_ms, exclude)
            .await
    }
}
