//! `LoretableServer` builder and accept loop.
//!
//! This is the entry point for running a live session server. It ties
//! together all the layers: transport → protocol → presence → store →
//! board → chat.

use std::sync::Arc;

use loretable_board::{FogService, TokenService};
use loretable_chat::ChatService;
use loretable_presence::{
    LivenessSweeper, PresenceConfig, PresenceRegistry,
};
use loretable_protocol::{Codec, JsonCodec};
use loretable_store::RecordStore;
use loretable_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::identity::IdentityResolver;
use crate::notify::LobbyNotifier;
use crate::LoretableError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry has interior mutability; the services are stateless views
/// over the store.
pub(crate) struct ServerState<S, I, N, C> {
    pub(crate) store: Arc<S>,
    pub(crate) registry: Arc<PresenceRegistry>,
    pub(crate) fog: FogService<S>,
    pub(crate) tokens: TokenService<S>,
    pub(crate) chat: ChatService<S>,
    pub(crate) identity: I,
    pub(crate) notifier: N,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Loretable server.
///
/// # Example
///
/// ```rust,ignore
/// let server = LoretableServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(store, my_resolver, NullNotifier)
///     .await?;
/// server.run().await
/// ```
pub struct LoretableServerBuilder {
    bind_addr: String,
    presence: PresenceConfig,
}

impl LoretableServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            presence: PresenceConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the liveness timing configuration.
    pub fn presence(mut self, config: PresenceConfig) -> Self {
        self.presence = config;
        self
    }

    /// Builds the server over the given store, identity resolver, and
    /// lobby notifier.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` as defaults.
    pub async fn build<S, I, N>(
        self,
        store: Arc<S>,
        identity: I,
        notifier: N,
    ) -> Result<LoretableServer<S, I, N, JsonCodec>, LoretableError>
    where
        S: RecordStore,
        I: IdentityResolver,
        N: LobbyNotifier,
    {
        let transport =
            WebSocketTransport::bind(&self.bind_addr).await?;

        let registry = Arc::new(PresenceRegistry::new());
        let sweeper =
            LivenessSweeper::spawn(Arc::clone(&registry), self.presence);

        let state = Arc::new(ServerState {
            fog: FogService::new(Arc::clone(&store)),
            tokens: TokenService::new(Arc::clone(&store)),
            chat: ChatService::new(Arc::clone(&store)),
            store,
            registry,
            identity,
            notifier,
            codec: JsonCodec,
        });

        Ok(LoretableServer {
            transport,
            state,
            sweeper,
        })
    }
}

impl Default for LoretableServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Loretable session server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LoretableServer<S, I, N, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, I, N, C>>,
    sweeper: LivenessSweeper,
}

impl<S, I, N, C> LoretableServer<S, I, N, C>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec + Clone,
{
    /// Creates a new builder.
    pub fn builder() -> LoretableServerBuilder {
        LoretableServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated; dropping the returned
    /// future (e.g. aborting the task running it) also stops the
    /// liveness sweeper.
    pub async fn run(self) -> Result<(), LoretableError> {
        let Self {
            mut transport,
            state,
            sweeper: _sweeper,
        } = self;
        tracing::info!("Loretable server running");

        loop {
            match transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
