//! Board state services for Loretable: fog-of-war and map tokens.
//!
//! Both services are thin authorization-and-invariant layers over the
//! record store; they own no in-memory state, so every mutation is
//! durable and reconnecting clients resynchronize from snapshots.

mod error;
mod fog;
mod locks;
mod token;

#[cfg(test)]
mod testutil;

pub use error::BoardError;
pub use fog::FogService;
pub use token::{PlaceToken, TokenService};
