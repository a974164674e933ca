//! Persisted record types.
//!
//! The session engine owns only session-scoped live state; everything
//! here is what it reads and writes through the [`RecordStore`]
//! (crate::RecordStore) seam. Wire-visible shapes (`Token`,
//! `ChatMessage`) live in the protocol crate and are persisted as-is;
//! this module adds the records that never travel whole.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use loretable_protocol::{
    BackdropId, Cell, ChannelId, CharacterId, ChatMessage, DiceRoll,
    GridKind, MapId, MessageKind, Role, SessionId, SessionSnapshot,
    SessionStatus, TokenImage, TokenKind, UserId,
};

/// A session's durable fields. The live presence set is not part of
/// this record; it dies with the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique id.
    pub id: SessionId,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// The owning DM.
    pub dm_user_id: UserId,
    /// Active map. Mutually exclusive with `active_backdrop_id`.
    pub active_map_id: Option<MapId>,
    /// Active backdrop. Mutually exclusive with `active_map_id`.
    pub active_backdrop_id: Option<BackdropId>,
    /// Creation time, unix milliseconds.
    pub created_at_ms: u64,
    /// Last mutation time, unix milliseconds.
    pub updated_at_ms: u64,
}

impl SessionRecord {
    /// The wire-facing view of this record.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            dm_user_id: self.dm_user_id,
            active_map_id: self.active_map_id,
            active_backdrop_id: self.active_backdrop_id,
        }
    }
}

/// The board geometry the fog service needs: grid family and declared
/// dimensions. Map imagery and grid pixel sizing are client concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRecord {
    /// Unique id.
    pub id: MapId,
    /// The session the map belongs to.
    pub session_id: SessionId,
    /// Display name.
    pub name: String,
    /// Square or hex.
    pub grid: GridKind,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

/// A user's durable membership in a session.
///
/// Presence is ephemeral; this record is what lets a player who left
/// rejoin later, and what gives chat its display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRecord {
    /// The session.
    pub session_id: SessionId,
    /// The user.
    pub user_id: UserId,
    /// Name shown in rosters and chat.
    pub display_name: String,
    /// Avatar URL, if set.
    pub avatar: Option<String>,
    /// DM or player.
    pub role: Role,
    /// Bound character record (players only).
    pub character_id: Option<CharacterId>,
    /// Bound character's name (players only).
    pub character_name: Option<String>,
    /// Whether the user has left (rejoinable; reset on reconnect).
    pub left: bool,
    /// First join time, unix milliseconds.
    pub joined_at_ms: u64,
}

/// A chat channel's durable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Unique id.
    pub id: ChannelId,
    /// The session the channel is scoped to.
    pub session_id: SessionId,
    /// Display name; `None` for the main channel and unnamed pairs.
    pub name: Option<String>,
    /// Whether this is the session's single main channel.
    pub is_main: bool,
    /// Member → last-read cursor (unix milliseconds).
    pub members: HashMap<UserId, u64>,
}

impl ChannelRecord {
    /// Current member ids, sorted for stable output.
    pub fn member_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.members.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Whether this is a non-main two-party channel between exactly
    /// `a` and `b` (order-insensitive).
    pub fn is_direct_between(&self, a: UserId, b: UserId) -> bool {
        !self.is_main
            && self.members.len() == 2
            && self.members.contains_key(&a)
            && self.members.contains_key(&b)
    }
}

/// Everything needed to create a token; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    /// The owning session.
    pub session_id: SessionId,
    /// The map to place onto.
    pub map_id: MapId,
    /// What the token represents.
    pub kind: TokenKind,
    /// Display name.
    pub name: String,
    /// Solid display color.
    pub color: Option<String>,
    /// Image display.
    pub image: Option<TokenImage>,
    /// Initial position.
    pub position: Cell,
    /// Optional linked record.
    pub character_id: Option<CharacterId>,
}

/// Everything needed to append a message; the store assigns id and
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Target channel.
    pub channel_id: ChannelId,
    /// Sender (the acting user, for system messages).
    pub sender_id: UserId,
    /// Text / roll / system.
    pub kind: MessageKind,
    /// Message body.
    pub content: String,
    /// Roll details for `Roll` messages.
    pub dice: Option<DiceRoll>,
}

/// A page of chat history: messages ascending by creation, plus
/// whether older history exists beyond the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    /// The page, oldest first.
    pub messages: Vec<ChatMessage>,
    /// True when messages older than this page exist.
    pub has_more: bool,
}
