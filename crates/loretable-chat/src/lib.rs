//! Chat and messaging for Loretable.
//!
//! Channels, messages, per-member read cursors, and the dice roller
//! that turns `/roll 3d6+1` into an evaluated roll message.

mod dice;
mod error;
mod service;

pub use dice::{
    DiceError, DiceExpr, MAX_COUNT, MAX_MODIFIER, MAX_SIDES,
    parse_roll_command,
};
pub use error::ChatError;
pub use service::{
    ChannelOutcome, ChatService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
