//! Inbound frames: everything a client can send.
//!
//! One closed tagged union over every inbound message kind, internally
//! tagged so the JSON carries a `"type"` discriminator with the
//! domain-prefixed names the client speaks (`"fog:reveal"`,
//! `"token:move"`, …). Unknown tags fail to deserialize, which the
//! connection handler reports back as a generic `error` event.

use serde::{Deserialize, Serialize};

use crate::ids::{
    BackdropId, ChannelId, CharacterId, MapId, SessionId, TokenId, UserId,
};
use crate::types::{Cell, SessionStatus, TokenImage, TokenKind};

/// A message from a client.
///
/// Grouped by owning domain; the dispatchers in the server crate each
/// claim their prefix and ignore the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    // -- Handshake & liveness ---------------------------------------------

    /// First frame on every connection: which session to join and the
    /// caller's identity token (resolved by the external identity seam).
    #[serde(rename = "session:join")]
    Join {
        /// The session to connect to.
        session_id: SessionId,
        /// Opaque identity token.
        token: String,
    },

    /// Liveness signal. Refreshes the sweep deadline; answered with
    /// `pong`.
    #[serde(rename = "ping")]
    Ping,

    // -- Fog of war (DM-only mutations) -----------------------------------

    /// Reveal the given cells.
    #[serde(rename = "fog:reveal")]
    FogReveal {
        /// The map whose fog is mutated.
        map_id: MapId,
        /// Cells to mark visible.
        cells: Vec<Cell>,
    },

    /// Reveal the map's entire coordinate space.
    #[serde(rename = "fog:reveal-all")]
    FogRevealAll {
        /// The map whose fog is mutated.
        map_id: MapId,
    },

    /// Clear the revealed set back to empty.
    #[serde(rename = "fog:hide-all")]
    FogHideAll {
        /// The map whose fog is mutated.
        map_id: MapId,
    },

    /// Request the full revealed set (any member).
    #[serde(rename = "fog:get-state")]
    FogGetState {
        /// The map to query.
        map_id: MapId,
    },

    // -- Tokens (DM-only mutations) ----------------------------------------

    /// Place a new token.
    #[serde(rename = "token:place")]
    TokenPlace {
        /// The map to place onto.
        map_id: MapId,
        /// What the token represents.
        kind: TokenKind,
        /// Display name.
        name: String,
        /// Initial grid position.
        position: Cell,
        /// Solid display color.
        #[serde(default)]
        color: Option<String>,
        /// Image display.
        #[serde(default)]
        image: Option<TokenImage>,
        /// Linked character/NPC/monster record.
        #[serde(default)]
        character_id: Option<CharacterId>,
    },

    /// Move an existing token.
    #[serde(rename = "token:move")]
    TokenMove {
        /// The token to move.
        token_id: TokenId,
        /// New grid position.
        position: Cell,
    },

    /// Remove a token.
    #[serde(rename = "token:remove")]
    TokenRemove {
        /// The token to remove.
        token_id: TokenId,
    },

    /// Request all tokens on a map (any member).
    #[serde(rename = "token:get-state")]
    TokenGetState {
        /// The map to query.
        map_id: MapId,
    },

    // -- Chat ---------------------------------------------------------------

    /// Send a message. Content beginning with a roll command is parsed
    /// and evaluated server-side.
    #[serde(rename = "chat:message")]
    ChatSend {
        /// Target channel.
        channel_id: ChannelId,
        /// Raw message text.
        content: String,
    },

    /// Create (or reuse) a channel with the named members.
    #[serde(rename = "chat:create_channel")]
    ChatCreateChannel {
        /// Members besides the creator (the creator is always added).
        participant_ids: Vec<UserId>,
        /// Optional display name.
        #[serde(default)]
        name: Option<String>,
    },

    /// Fetch a page of message history.
    #[serde(rename = "chat:get_messages")]
    ChatGetMessages {
        /// Channel to read.
        channel_id: ChannelId,
        /// Return only messages strictly older than this id.
        #[serde(default)]
        before: Option<crate::ids::MessageId>,
        /// Page size; clamped server-side.
        #[serde(default)]
        limit: Option<usize>,
    },

    /// Advance the caller's read cursor to now.
    #[serde(rename = "chat:mark_read")]
    ChatMarkRead {
        /// Channel being read.
        channel_id: ChannelId,
    },

    // -- WebRTC signaling ----------------------------------------------------

    /// Relay an SDP offer to one participant.
    #[serde(rename = "rtc:offer")]
    RtcOffer {
        /// Target participant.
        target: UserId,
        /// Opaque negotiation payload; the relay never inspects it.
        payload: serde_json::Value,
    },

    /// Relay an SDP answer to one participant.
    #[serde(rename = "rtc:answer")]
    RtcAnswer {
        /// Target participant.
        target: UserId,
        /// Opaque negotiation payload.
        payload: serde_json::Value,
    },

    /// Relay an ICE candidate to one participant.
    #[serde(rename = "rtc:ice-candidate")]
    RtcIceCandidate {
        /// Target participant.
        target: UserId,
        /// Opaque negotiation payload.
        payload: serde_json::Value,
    },

    /// Announce the sender's mute state to the whole session.
    #[serde(rename = "rtc:mute-state")]
    RtcMuteState {
        /// Opaque state payload.
        payload: serde_json::Value,
    },

    // -- Session display & status (DM-only) ----------------------------------

    /// Activate a map. Clears any active backdrop.
    #[serde(rename = "session:set-map")]
    SetMap {
        /// The map to activate.
        map_id: MapId,
    },

    /// Activate a backdrop. Clears any active map.
    #[serde(rename = "session:set-backdrop")]
    SetBackdrop {
        /// The backdrop to activate.
        backdrop_id: BackdropId,
    },

    /// Clear both the active map and the active backdrop.
    #[serde(rename = "session:clear-display")]
    ClearDisplay,

    /// Move the session through its status machine.
    #[serde(rename = "session:set-status")]
    SetStatus {
        /// The requested status.
        status: SessionStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> ClientFrame {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_join_frame_tag() {
        let frame =
            decode(r#"{"type":"session:join","session_id":3,"token":"abc"}"#);
        assert_eq!(
            frame,
            ClientFrame::Join {
                session_id: SessionId(3),
                token: "abc".into()
            }
        );
    }

    #[test]
    fn test_ping_frame_tag() {
        assert_eq!(decode(r#"{"type":"ping"}"#), ClientFrame::Ping);
    }

    #[test]
    fn test_fog_reveal_frame() {
        let frame = decode(
            r#"{"type":"fog:reveal","map_id":1,"cells":[{"col":2,"row":3}]}"#,
        );
        assert_eq!(
            frame,
            ClientFrame::FogReveal {
                map_id: MapId(1),
                cells: vec![Cell::Square { col: 2, row: 3 }],
            }
        );
    }

    #[test]
    fn test_token_place_defaults() {
        // color / image / character_id may all be omitted.
        let frame = decode(
            r#"{"type":"token:place","map_id":1,"kind":"party",
                "name":"The Party","position":{"col":0,"row":0}}"#,
        );
        match frame {
            ClientFrame::TokenPlace {
                kind, color, image, character_id, ..
            } => {
                assert_eq!(kind, TokenKind::Party);
                assert!(color.is_none());
                assert!(image.is_none());
                assert!(character_id.is_none());
            }
            other => panic!("wrong frame: {other:?}"),
        }
    }

    #[test]
    fn test_chat_get_messages_defaults() {
        let frame =
            decode(r#"{"type":"chat:get_messages","channel_id":4}"#);
        assert_eq!(
            frame,
            ClientFrame::ChatGetMessages {
                channel_id: ChannelId(4),
                before: None,
                limit: None,
            }
        );
    }

    #[test]
    fn test_rtc_payload_is_opaque() {
        // Arbitrary JSON passes through untouched.
        let frame = decode(
            r#"{"type":"rtc:offer","target":9,"payload":{"sdp":"v=0","x":[1]}}"#,
        );
        match frame {
            ClientFrame::RtcOffer { target, payload } => {
                assert_eq!(target, UserId(9));
                assert_eq!(payload["sdp"], "v=0");
            }
            other => panic!("wrong frame: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let result: Result<ClientFrame, _> =
            serde_json::from_str(r#"{"type":"fog:paint-it-black"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_set_status_frame() {
        let frame =
            decode(r#"{"type":"session:set-status","status":"paused"}"#);
        assert_eq!(
            frame,
            ClientFrame::SetStatus {
                status: SessionStatus::Paused
            }
        );
    }
}
