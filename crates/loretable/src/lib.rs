//! # Loretable
//!
//! Real-time session engine for virtual tabletops.
//!
//! Loretable keeps everyone at a table in sync over WebSockets: who is
//! present, what the fog of war hides, where the tokens stand, what
//! was said (and rolled) in chat, and the signaling handshake for
//! peer-to-peer voice. Accounts, campaign CRUD, and asset storage stay
//! with the hosting platform, injected through the [`IdentityResolver`]
//! and [`RecordStore`](loretable_store::RecordStore) seams.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use loretable::{LoretableServerBuilder, NullNotifier, StaticTokenResolver};
//! use loretable_store::MemoryStore;
//!
//! # async fn run() -> Result<(), loretable::LoretableError> {
//! let store = Arc::new(MemoryStore::new());
//! let resolver = StaticTokenResolver::new();
//! let server = LoretableServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(store, resolver, NullNotifier)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod dispatch;
mod error;
mod handler;
mod identity;
mod lifecycle;
mod notify;
mod server;
mod signaling;

pub use error::LoretableError;
pub use identity::{
    Identity, IdentityError, IdentityResolver, StaticTokenResolver,
};
pub use lifecycle::LifecycleError;
pub use notify::{LobbyNotifier, NullNotifier};
pub use server::{LoretableServer, LoretableServerBuilder};

pub use loretable_board as board;
pub use loretable_chat as chat;
pub use loretable_presence as presence;
pub use loretable_protocol as protocol;
pub use loretable_store as store;
pub use loretable_transport as transport;
