//! Shared domain types that travel on the wire.
//!
//! These are the structures embedded inside frames and events: grid
//! cells, tokens, chat messages, session snapshots. They are also what
//! the store persists, so the store crate reuses them instead of
//! defining parallel record types.

use serde::{Deserialize, Serialize};

use crate::ids::{
    BackdropId, ChannelId, CharacterId, MapId, MessageId, SessionId,
    TokenId, UserId,
};

// ---------------------------------------------------------------------------
// Roles and session status
// ---------------------------------------------------------------------------

/// A participant's role within a session.
///
/// The DM is the session's privileged participant: sole authority for
/// display switching, fog reveal, and token placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dungeon Master.
    Dm,
    /// Regular player.
    Player,
}

impl Role {
    /// Whether this role may perform DM-only mutations.
    pub fn is_dm(self) -> bool {
        matches!(self, Role::Dm)
    }
}

/// Lifecycle status of a session.
///
/// ```text
///   Forming ──→ Active ⇄ Paused
///      │           │       │
///      └───────────┴───────┴──→ Ended (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, players gathering; nothing has started yet.
    Forming,
    /// Session in progress.
    Active,
    /// Temporarily paused by the DM.
    Paused,
    /// Over. No further transitions.
    Ended,
}

impl SessionStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// `Ended` is terminal, and no status ever returns to `Forming`.
    /// A same-status "transition" is permitted (idempotent no-op).
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        if self == next {
            return true;
        }
        match (self, next) {
            (SessionStatus::Ended, _) => false,
            (_, SessionStatus::Forming) => false,
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Grid coordinates
// ---------------------------------------------------------------------------

/// The coordinate family a map uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    /// Square grid, addressed by column and row.
    Square,
    /// Hex grid, addressed by axial (q, r).
    Hex,
}

/// A single grid cell.
///
/// Square cells are addressed by `(col, row)`, hex cells by axial
/// `(q, r)`. The two families have disjoint field names, so `untagged`
/// deserialization is unambiguous: `{"col":2,"row":3}` vs
/// `{"q":0,"r":1}`. Equality and hashing are structural, which is what
/// makes the revealed-cell set an O(1) membership check — and a square
/// cell never compares equal to a hex cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum Cell {
    /// A square-grid cell.
    Square {
        /// Column, 0-based from the map's left edge.
        col: i32,
        /// Row, 0-based from the map's top edge.
        row: i32,
    },
    /// A hex-grid cell in axial coordinates.
    Hex {
        /// Axial q coordinate.
        q: i32,
        /// Axial r coordinate.
        r: i32,
    },
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// What a map token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// The player party marker. At most one per map.
    Party,
    /// A non-player character.
    Npc,
    /// A monster.
    Monster,
    /// Anything else (loot, hazards, props).
    Generic,
}

/// Image display for a token: a URL plus the pixel within the image
/// that sits on the token's grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenImage {
    /// Where the client fetches the image from.
    pub url: String,
    /// Hotspot x offset in image pixels.
    pub hotspot_x: u32,
    /// Hotspot y offset in image pixels.
    pub hotspot_y: u32,
}

/// A positioned marker on a map. Persisted, so it survives reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Unique id, allocated by the store.
    pub id: TokenId,
    /// The session this token belongs to. Tokens are never visible
    /// across sessions.
    pub session_id: SessionId,
    /// The map the token sits on.
    pub map_id: MapId,
    /// What the token represents.
    pub kind: TokenKind,
    /// Display name.
    pub name: String,
    /// Solid display color (CSS string), used when no image is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Image display, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<TokenImage>,
    /// Current grid position.
    pub position: Cell,
    /// Optional link to a character/NPC/monster record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<CharacterId>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// The type of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Ordinary text written by a participant.
    Text,
    /// A dice roll; `ChatMessage::dice` carries the details.
    Roll,
    /// Engine-generated announcement (join/leave).
    System,
}

/// The outcome of evaluating a dice expression, stored alongside a
/// `Roll` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// The expression as written, e.g. `"3d6+1"`.
    pub expression: String,
    /// Each individual die result, in roll order.
    pub rolls: Vec<u32>,
    /// The signed modifier.
    pub modifier: i32,
    /// Sum of rolls plus modifier.
    pub total: i32,
}

/// A persisted chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique id; monotonic, so it doubles as the pagination cursor.
    pub id: MessageId,
    /// The channel the message was sent to.
    pub channel_id: ChannelId,
    /// Who sent it. System messages carry the acting user.
    pub sender_id: UserId,
    /// Text / roll / system.
    pub kind: MessageKind,
    /// Message body. For rolls this is the original command text.
    pub content: String,
    /// Roll details, present only when `kind` is `Roll`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dice: Option<DiceRoll>,
    /// Creation time, unix milliseconds.
    pub sent_at_ms: u64,
}

/// A channel as presented to one particular user (includes that user's
/// unread count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// Unique id.
    pub id: ChannelId,
    /// Display name. `None` for the main channel and unnamed pairs.
    pub name: Option<String>,
    /// Whether this is the session's main channel.
    pub is_main: bool,
    /// Current membership.
    pub member_ids: Vec<UserId>,
    /// Messages newer than the viewing user's read cursor, authored by
    /// someone else.
    pub unread: usize,
}

// ---------------------------------------------------------------------------
// Session snapshots
// ---------------------------------------------------------------------------

/// Session metadata as pushed to clients in `session:state` and
/// `session:updated` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Unique id.
    pub id: SessionId,
    /// Display name of the session.
    pub name: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// The DM's user id.
    pub dm_user_id: UserId,
    /// Active map, if any. Mutually exclusive with the backdrop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_map_id: Option<MapId>,
    /// Active backdrop, if any. Mutually exclusive with the map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_backdrop_id: Option<BackdropId>,
}

/// A connected participant as seen by other clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    /// Who this is.
    pub user_id: UserId,
    /// Name shown in the roster and chat.
    pub display_name: String,
    /// Avatar image URL, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// DM or player.
    pub role: Role,
    /// Bound character record (players only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<CharacterId>,
    /// Bound character's name (players only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Recipient — fan-out addressing
// ---------------------------------------------------------------------------

/// Who should receive an outbound event.
///
/// Dispatchers return `(Recipient, ServerEvent)` pairs; the connection
/// handler resolves each recipient against the presence registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected participant in the session.
    All,
    /// One specific participant.
    User(UserId),
    /// Everyone except the given participant (typically the sender).
    AllExcept(UserId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Dm).unwrap(), "\"dm\"");
        assert_eq!(
            serde_json::to_string(&Role::Player).unwrap(),
            "\"player\""
        );
    }

    #[test]
    fn test_status_transitions() {
        use SessionStatus::*;
        assert!(Forming.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Active.can_transition_to(Ended));
        assert!(Forming.can_transition_to(Ended));
        assert!(!Ended.can_transition_to(Active));
        assert!(!Active.can_transition_to(Forming));
        // Idempotent same-status.
        assert!(Paused.can_transition_to(Paused));
        assert!(Ended.can_transition_to(Ended));
    }

    #[test]
    fn test_square_cell_json_shape() {
        let cell = Cell::Square { col: 2, row: 3 };
        let json: serde_json::Value = serde_json::to_value(cell).unwrap();
        assert_eq!(json, serde_json::json!({ "col": 2, "row": 3 }));

        let back: Cell =
            serde_json::from_value(serde_json::json!({ "col": 2, "row": 3 }))
                .unwrap();
        assert_eq!(back, cell);
    }

    #[test]
    fn test_hex_cell_json_shape() {
        let cell = Cell::Hex { q: -1, r: 4 };
        let back: Cell =
            serde_json::from_value(serde_json::json!({ "q": -1, "r": 4 }))
                .unwrap();
        assert_eq!(back, cell);
    }

    #[test]
    fn test_square_and_hex_cells_never_compare_equal() {
        // Same underlying numbers, different coordinate family.
        let sq = Cell::Square { col: 1, row: 2 };
        let hex = Cell::Hex { q: 1, r: 2 };
        assert_ne!(sq, hex);

        let mut set = std::collections::HashSet::new();
        set.insert(sq);
        assert!(!set.contains(&hex));
    }

    #[test]
    fn test_token_optional_fields_omitted_when_absent() {
        let token = Token {
            id: TokenId(1),
            session_id: SessionId(1),
            map_id: MapId(1),
            kind: TokenKind::Monster,
            name: "Gnoll".into(),
            color: Some("#aa3311".into()),
            image: None,
            position: Cell::Square { col: 0, row: 0 },
            character_id: None,
        };
        let json: serde_json::Value =
            serde_json::to_value(&token).unwrap();
        assert_eq!(json["kind"], "monster");
        assert!(json.get("image").is_none());
        assert!(json.get("character_id").is_none());
    }

    #[test]
    fn test_chat_message_roll_round_trip() {
        let msg = ChatMessage {
            id: MessageId(10),
            channel_id: ChannelId(2),
            sender_id: UserId(5),
            kind: MessageKind::Roll,
            content: "/roll 3d6+1".into(),
            dice: Some(DiceRoll {
                expression: "3d6+1".into(),
                rolls: vec![2, 5, 6],
                modifier: 1,
                total: 14,
            }),
            sent_at_ms: 1_700_000_000_000,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let back: ChatMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, back);
    }
}
