//! Presence layer for Loretable.
//!
//! Tracks which users are connected to which sessions, fans events out
//! to them, and evicts connections that go silent. Everything here is
//! ephemeral: the registry starts empty on every process start, and
//! clients resynchronize from the snapshots the lifecycle coordinator
//! pushes on connect.

mod error;
mod registry;
mod sweeper;

pub use error::PresenceError;
pub use registry::{Outbound, OutboundSender, Participant, PresenceRegistry};
pub use sweeper::{LivenessSweeper, PresenceConfig};
