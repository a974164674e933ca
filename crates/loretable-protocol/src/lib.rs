//! Wire protocol for Loretable.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Identifiers** ([`SessionId`], [`UserId`], [`TokenId`], …) —
//!   newtype ids used across every layer.
//! - **Types** ([`Cell`], [`Token`], [`ChatMessage`], …) — the domain
//!   structures embedded in frames, events, and persisted records.
//! - **Frames & events** ([`ClientFrame`], [`ServerEvent`]) — the two
//!   tagged unions that make up the wire contract.
//! - **Codec** ([`Codec`], [`JsonCodec`]) — how those become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections, sessions, or
//! persistence; it only describes shapes.

mod codec;
mod error;
mod events;
mod frames;
mod ids;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::ServerEvent;
pub use frames::ClientFrame;
pub use ids::{
    BackdropId, ChannelId, CharacterId, MapId, MessageId, SessionId,
    TokenId, UserId,
};
pub use types::{
    Cell, ChannelSummary, ChatMessage, DiceRoll, GridKind, MessageKind,
    ParticipantSummary, Recipient, Role, SessionSnapshot, SessionStatus,
    Token, TokenImage, TokenKind,
};
