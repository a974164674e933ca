//! The durable record-store seam.
//!
//! Persistence is an external collaborator: the engine reads and writes
//! records through [`RecordStore`] and never cares what backs it. The
//! crate ships [`MemoryStore`](crate::MemoryStore) for development and
//! tests; a SQL-backed implementation satisfies the same contract.
//!
//! Every method may suspend — these are the only blocking points in the
//! engine's dispatch path. Each individual call must be atomic
//! (`MemoryStore` uses a single lock; a SQL store would use a
//! transaction); read-modify-write sequences spanning several calls
//! are serialized per map by the board services, not here.

use std::collections::HashSet;

use loretable_protocol::{
    Cell, ChannelId, ChatMessage, MapId, MessageId, SessionId, Token,
    TokenId, UserId,
};

use crate::records::{
    ChannelRecord, MapRecord, MessagePage, NewMessage, NewToken,
    ParticipationRecord, SessionRecord,
};
use crate::StoreError;

/// Durable storage for session-scoped records.
pub trait RecordStore: Send + Sync + 'static {
    // -- Sessions & maps ---------------------------------------------------

    /// Loads a session record.
    fn session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<SessionRecord, StoreError>> + Send;

    /// Persists a mutated session record (status, active display,
    /// `updated_at_ms`).
    fn update_session(
        &self,
        record: SessionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Loads a map record.
    fn map(
        &self,
        id: MapId,
    ) -> impl Future<Output = Result<MapRecord, StoreError>> + Send;

    // -- Participation -----------------------------------------------------

    /// Loads one user's participation record, if any.
    fn participation(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<ParticipationRecord>, StoreError>> + Send;

    /// Creates or replaces a participation record.
    fn upsert_participation(
        &self,
        record: ParticipationRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All participation records for a session, including left ones.
    fn participants(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<ParticipationRecord>, StoreError>> + Send;

    // -- Fog of war --------------------------------------------------------

    /// The revealed-cell set for a map. Empty when never revealed.
    fn fog_cells(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> impl Future<Output = Result<HashSet<Cell>, StoreError>> + Send;

    /// Replaces the revealed-cell set wholesale. Single-call
    /// read-modify-write so implementations can make it atomic.
    fn replace_fog_cells(
        &self,
        session_id: SessionId,
        map_id: MapId,
        cells: HashSet<Cell>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // -- Tokens ------------------------------------------------------------

    /// All tokens on a map.
    fn tokens_on_map(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> impl Future<Output = Result<Vec<Token>, StoreError>> + Send;

    /// Loads a token by id, if it exists.
    fn token(
        &self,
        id: TokenId,
    ) -> impl Future<Output = Result<Option<Token>, StoreError>> + Send;

    /// Creates a token, assigning its id.
    fn insert_token(
        &self,
        new: NewToken,
    ) -> impl Future<Output = Result<Token, StoreError>> + Send;

    /// Moves a token.
    fn update_token_position(
        &self,
        id: TokenId,
        position: Cell,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a token.
    fn remove_token(
        &self,
        id: TokenId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // -- Channels ----------------------------------------------------------

    /// Loads a channel by id, if it exists.
    fn channel(
        &self,
        id: ChannelId,
    ) -> impl Future<Output = Result<Option<ChannelRecord>, StoreError>> + Send;

    /// All channels in a session.
    fn channels_in_session(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<ChannelRecord>, StoreError>> + Send;

    /// The session's main channel.
    fn main_channel(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<ChannelRecord, StoreError>> + Send;

    /// Creates a channel with the given members (read cursors start at
    /// zero), assigning its id.
    fn create_channel(
        &self,
        session_id: SessionId,
        name: Option<String>,
        is_main: bool,
        members: Vec<UserId>,
    ) -> impl Future<Output = Result<ChannelRecord, StoreError>> + Send;

    /// Adds a member to a channel (no-op if already present).
    fn add_channel_member(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes a member from a channel (no-op if absent).
    fn remove_channel_member(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Sets a member's read cursor. Callers enforce forward-only.
    fn set_last_read(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        at_ms: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // -- Messages ----------------------------------------------------------

    /// Appends a message, assigning id and timestamp. Ids are
    /// monotonic, so id order is creation order.
    fn append_message(
        &self,
        new: NewMessage,
    ) -> impl Future<Output = Result<ChatMessage, StoreError>> + Send;

    /// A page of up to `limit` messages strictly older than `before`
    /// (or the newest page when `before` is `None`), oldest first.
    fn messages_before(
        &self,
        channel_id: ChannelId,
        before: Option<MessageId>,
        limit: usize,
    ) -> impl Future<Output = Result<MessagePage, StoreError>> + Send;

    /// How many messages in a channel are newer than `after_ms` and
    /// authored by someone other than `exclude` (the unread count).
    fn count_messages_newer(
        &self,
        channel_id: ChannelId,
        after_ms: u64,
        exclude: UserId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// Wall-clock time as unix milliseconds.
///
/// Record timestamps use the wall clock (they are durable and compared
/// across restarts); liveness bookkeeping uses `Instant` instead.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
