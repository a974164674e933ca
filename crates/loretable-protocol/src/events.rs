//! Outbound events: everything the server can push to a client.

use serde::{Deserialize, Serialize};

use crate::ids::{MapId, TokenId, UserId};
use crate::types::{
    Cell, ChannelSummary, ChatMessage, ParticipantSummary,
    SessionSnapshot, Token,
};

/// A message from the server to one or more clients.
///
/// Internally tagged like [`ClientFrame`](crate::ClientFrame), with the
/// event names from the wire contract. Events carry full values rather
/// than deltas where reconnecting clients need to resynchronize from
/// them (`session:state`, `fog:state`, `token:state`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // -- Connection & session -------------------------------------------

    /// Full snapshot pushed to a connection right after it joins.
    #[serde(rename = "session:state")]
    SessionState {
        /// Session metadata.
        session: SessionSnapshot,
        /// Everyone currently connected, including the recipient.
        participants: Vec<ParticipantSummary>,
    },

    /// Liveness reply.
    #[serde(rename = "pong")]
    Pong,

    /// A participant connected.
    #[serde(rename = "user:connected")]
    UserConnected {
        /// Who joined.
        participant: ParticipantSummary,
    },

    /// A participant disconnected (or was evicted by the sweep).
    #[serde(rename = "user:disconnected")]
    UserDisconnected {
        /// Who left.
        user_id: UserId,
    },

    /// Session metadata changed (status or active display).
    #[serde(rename = "session:updated")]
    SessionUpdated {
        /// The new metadata.
        session: SessionSnapshot,
    },

    // -- Fog of war -------------------------------------------------------

    /// Full revealed set for a map.
    #[serde(rename = "fog:state")]
    FogState {
        /// The map in question.
        map_id: MapId,
        /// Every currently revealed cell.
        revealed: Vec<Cell>,
    },

    /// Incremental reveal: only the newly revealed cells.
    #[serde(rename = "fog:updated")]
    FogUpdated {
        /// The map in question.
        map_id: MapId,
        /// Cells that just became visible.
        revealed: Vec<Cell>,
    },

    // -- Tokens -----------------------------------------------------------

    /// Full token list for a map.
    #[serde(rename = "token:state")]
    TokenState {
        /// The map in question.
        map_id: MapId,
        /// Every token on the map.
        tokens: Vec<Token>,
    },

    /// A token was placed.
    #[serde(rename = "token:placed")]
    TokenPlaced {
        /// The new token.
        token: Token,
    },

    /// A token moved.
    #[serde(rename = "token:moved")]
    TokenMoved {
        /// Which token.
        token_id: TokenId,
        /// Its new position.
        position: Cell,
    },

    /// A token was removed.
    #[serde(rename = "token:removed")]
    TokenRemoved {
        /// Which token.
        token_id: TokenId,
    },

    // -- Chat -------------------------------------------------------------

    /// The caller's channel list (sent on join and on request).
    #[serde(rename = "chat:channels")]
    ChatChannels {
        /// Channels visible to the recipient, with unread counts.
        channels: Vec<ChannelSummary>,
    },

    /// A channel the recipient belongs to was created.
    #[serde(rename = "chat:channel_created")]
    ChannelCreated {
        /// The channel, summarized for the recipient.
        channel: ChannelSummary,
    },

    /// A new message in a channel the recipient belongs to.
    #[serde(rename = "chat:message")]
    ChatMessageEvent {
        /// The stored message.
        message: ChatMessage,
    },

    /// A page of history, oldest first.
    #[serde(rename = "chat:messages")]
    ChatMessages {
        /// Channel the page belongs to.
        channel_id: crate::ids::ChannelId,
        /// The page, ascending by creation.
        messages: Vec<ChatMessage>,
        /// Whether older history exists beyond this page.
        has_more: bool,
    },

    // -- WebRTC signaling ---------------------------------------------------

    /// Relayed SDP offer.
    #[serde(rename = "rtc:offer")]
    RtcOffer {
        /// The originating participant.
        from: UserId,
        /// Opaque negotiation payload.
        payload: serde_json::Value,
    },

    /// Relayed SDP answer.
    #[serde(rename = "rtc:answer")]
    RtcAnswer {
        /// The originating participant.
        from: UserId,
        /// Opaque negotiation payload.
        payload: serde_json::Value,
    },

    /// Relayed ICE candidate.
    #[serde(rename = "rtc:ice-candidate")]
    RtcIceCandidate {
        /// The originating participant.
        from: UserId,
        /// Opaque negotiation payload.
        payload: serde_json::Value,
    },

    /// Relayed mute-state announcement.
    #[serde(rename = "rtc:mute-state")]
    RtcMuteState {
        /// The originating participant.
        from: UserId,
        /// Opaque state payload.
        payload: serde_json::Value,
    },

    // -- Errors -------------------------------------------------------------

    /// A rejection, delivered only to the offending connection.
    #[serde(rename = "error")]
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl ServerEvent {
    /// Convenience constructor for error events.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ChannelId, SessionId};
    use crate::types::SessionStatus;

    #[test]
    fn test_event_tags_match_wire_contract() {
        let cases: Vec<(ServerEvent, &str)> = vec![
            (ServerEvent::Pong, "pong"),
            (
                ServerEvent::UserDisconnected { user_id: UserId(1) },
                "user:disconnected",
            ),
            (
                ServerEvent::FogUpdated {
                    map_id: MapId(1),
                    revealed: vec![],
                },
                "fog:updated",
            ),
            (
                ServerEvent::TokenRemoved {
                    token_id: TokenId(4),
                },
                "token:removed",
            ),
            (
                ServerEvent::ChatChannels { channels: vec![] },
                "chat:channels",
            ),
            (ServerEvent::error("nope"), "error"),
        ];
        for (event, tag) in cases {
            let json: serde_json::Value =
                serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], tag, "wrong tag for {event:?}");
        }
    }

    #[test]
    fn test_session_state_round_trip() {
        let event = ServerEvent::SessionState {
            session: SessionSnapshot {
                id: SessionId(1),
                name: "Tomb of the Serpent".into(),
                status: SessionStatus::Active,
                dm_user_id: UserId(1),
                active_map_id: Some(MapId(2)),
                active_backdrop_id: None,
            },
            participants: vec![],
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        let back: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_chat_messages_page_shape() {
        let event = ServerEvent::ChatMessages {
            channel_id: ChannelId(3),
            messages: vec![],
            has_more: true,
        };
        let json: serde_json::Value =
            serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "chat:messages");
        assert_eq!(json["has_more"], true);
    }

    #[test]
    fn test_rtc_relay_carries_sender() {
        let event = ServerEvent::RtcMuteState {
            from: UserId(8),
            payload: serde_json::json!({ "muted": true }),
        };
        let json: serde_json::Value =
            serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "rtc:mute-state");
        assert_eq!(json["from"], 8);
        assert_eq!(json["payload"]["muted"], true);
    }
}
