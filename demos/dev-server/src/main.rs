//! Development server: an in-memory table you can poke with any
//! WebSocket client.
//!
//! Seeds one session with a square map and a hex map, plus three
//! static join tokens (`dm`, `asha`, `bram`). Nothing survives a
//! restart.

use std::sync::Arc;

use loretable::{
    Identity, LoretableServerBuilder, NullNotifier, StaticTokenResolver,
};
use loretable_protocol::{CharacterId, GridKind, Role, UserId};
use loretable_store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Arc::new(MemoryStore::new());
    let session =
        store.create_session("The Sunken Citadel", UserId(1)).await;
    let crypt = store
        .create_map(session.id, "Crypt Level", GridKind::Square, 30, 20)
        .await;
    let overland = store
        .create_map(session.id, "Overland", GridKind::Hex, 16, 12)
        .await;

    let mut resolver = StaticTokenResolver::new();
    resolver.insert(
        "dm",
        Identity {
            user_id: UserId(1),
            role: Role::Dm,
            display_name: "Marta".into(),
            avatar: None,
            character_id: None,
            character_name: None,
        },
    );
    resolver.insert(
        "asha",
        Identity {
            user_id: UserId(2),
            role: Role::Player,
            display_name: "Asha".into(),
            avatar: None,
            character_id: Some(CharacterId(1)),
            character_name: Some("Vex".into()),
        },
    );
    resolver.insert(
        "bram",
        Identity {
            user_id: UserId(3),
            role: Role::Player,
            display_name: "Bram".into(),
            avatar: None,
            character_id: Some(CharacterId(2)),
            character_name: Some("Thorn".into()),
        },
    );

    tracing::info!(
        session_id = %session.id,
        square_map = %crypt.id,
        hex_map = %overland.id,
        "seeded dev table; join with token dm, asha, or bram"
    );

    let server = LoretableServerBuilder::new()
        .bind("127.0.0.1:8765")
        .build(store, resolver, NullNotifier)
        .await?;
    server.run().await?;
    Ok(())
}
