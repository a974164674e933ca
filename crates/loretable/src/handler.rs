//! Per-connection handler: join, writer task, and frame routing.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive `session:join` → resolve the identity token
//!   2. Spawn the writer task draining the outbound queue
//!   3. Run the connect sequence (register, snapshots, announcements)
//!   4. Loop: decode frames → dispatch → deliver the results
//!
//! A rejected frame sends an `error` event to this connection only and
//! leaves the connection open; only transport failure, a clean close,
//! or a missed join deadline end the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use loretable_presence::{Outbound, PresenceRegistry};
use loretable_protocol::{
    ClientFrame, Codec, ProtocolError, Recipient, ServerEvent,
};
use loretable_store::RecordStore;
use loretable_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::dispatch::{self, Deliveries, RequestContext};
use crate::identity::IdentityResolver;
use crate::notify::LobbyNotifier;
use crate::server::ServerState;
use crate::{lifecycle, LoretableError};

/// How long a fresh connection gets to send its `session:join`.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Drop guard that runs the disconnect sequence when the handler
/// exits. This ensures cleanup happens even if the handler panics.
/// Since `Drop` is synchronous, we spawn a fire-and-forget task.
struct PresenceGuard<S, I, N, C>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    ctx: RequestContext,
    connection_id: ConnectionId,
    state: Arc<ServerState<S, I, N, C>>,
}

impl<S, I, N, C> Drop for PresenceGuard<S, I, N, C>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    fn drop(&mut self) {
        let session_id = self.ctx.session_id;
        let user_id = self.ctx.user_id;
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            lifecycle::disconnect(
                &state,
                session_id,
                user_id,
                connection_id,
            )
            .await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, I, N, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, I, N, C>>,
) -> Result<(), LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec + Clone,
{
    let connection_id = conn.id();
    tracing::debug!(%connection_id, "handling new connection");

    // --- Step 1: join ---
    let data = match tokio::time::timeout(JOIN_TIMEOUT, conn.recv())
        .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => return Ok(()),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            send_direct(
                &conn,
                &state.codec,
                &ServerEvent::error("join timed out"),
            )
            .await;
            let _ = conn.close().await;
            return Ok(());
        }
    };
    let (session_id, token) =
        match state.codec.decode::<ClientFrame>(&data) {
            Ok(ClientFrame::Join { session_id, token }) => {
                (session_id, token)
            }
            Ok(_) => {
                let err = ProtocolError::InvalidFrame(
                    "first frame must be session:join".into(),
                );
                send_direct(
                    &conn,
                    &state.codec,
                    &ServerEvent::error(err.to_string()),
                )
                .await;
                let _ = conn.close().await;
                return Ok(());
            }
            Err(e) => {
                send_direct(
                    &conn,
                    &state.codec,
                    &ServerEvent::error(format!("bad frame: {e}")),
                )
                .await;
                let _ = conn.close().await;
                return Ok(());
            }
        };

    let identity =
        match state.identity.resolve(session_id, &token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::info!(
                    %connection_id, %session_id, error = %e,
                    "join rejected"
                );
                send_direct(
                    &conn,
                    &state.codec,
                    &ServerEvent::error(e.to_string()),
                )
                .await;
                let _ = conn.close().await;
                return Ok(());
            }
        };
    let ctx = RequestContext {
        session_id,
        user_id: identity.user_id,
        role: identity.role,
    };

    // --- Step 2: writer task ---
    // The registry reaches this connection through `sender`; the
    // writer drains the queue onto the socket so fan-out never blocks
    // on network I/O.
    let (sender, mut outbound) = mpsc::unbounded_channel();
    let writer_conn = conn.clone();
    let writer_codec = state.codec.clone();
    tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            match item {
                Outbound::Event(event) => {
                    // A half-dead peer (send already failed, or the
                    // reader saw the close) gets no further writes.
                    if !writer_conn.is_open() {
                        break;
                    }
                    let bytes = match writer_codec.encode(&event) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "failed to encode outbound event"
                            );
                            continue;
                        }
                    };
                    if writer_conn.send(&bytes).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = writer_conn.close().await;
                    break;
                }
            }
        }
    });

    // --- Step 3: connect sequence ---
    if let Err(e) = lifecycle::connect(
        &state,
        session_id,
        identity,
        connection_id,
        sender.clone(),
    )
    .await
    {
        tracing::info!(
            %connection_id, %session_id, error = %e,
            "connect sequence failed"
        );
        let _ = sender.send(Outbound::Event(ServerEvent::error(
            e.to_string(),
        )));
        let _ = sender.send(Outbound::Close);
        return Ok(());
    }
    let user_id = ctx.user_id;
    let _guard = PresenceGuard {
        ctx,
        connection_id,
        state: Arc::clone(&state),
    };

    // --- Step 4: frame loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%user_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%user_id, error = %e, "recv error");
                break;
            }
        };
        let frame: ClientFrame = match state.codec.decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = sender.send(Outbound::Event(
                    ServerEvent::error(format!("bad frame: {e}")),
                ));
                continue;
            }
        };

        match frame {
            ClientFrame::Ping => {
                state.registry.touch_liveness(session_id, user_id);
                let _ =
                    sender.send(Outbound::Event(ServerEvent::Pong));
            }
            ClientFrame::Join { .. } => {
                let err = ProtocolError::InvalidFrame(
                    "already joined".into(),
                );
                let _ = sender.send(Outbound::Event(
                    ServerEvent::error(err.to_string()),
                ));
            }
            ref frame => {
                match dispatch::dispatch(&state, &ctx, frame).await {
                    Some(Ok(deliveries)) => {
                        deliver(&state.registry, &ctx, deliveries);
                    }
                    Some(Err(e)) => {
                        // Rejections go to the offending connection
                        // only; the rest of the session never hears.
                        tracing::debug!(
                            %user_id, error = %e, "frame rejected"
                        );
                        let _ = sender.send(Outbound::Event(
                            ServerEvent::error(e.to_string()),
                        ));
                    }
                    None => {
                        let _ = sender.send(Outbound::Event(
                            ServerEvent::error(
                                "unsupported message type",
                            ),
                        ));
                    }
                }
            }
        }
    }

    // _guard drops here → the disconnect sequence fires.
    Ok(())
}

/// Performs the deliveries a dispatcher returned, in order.
fn deliver(
    registry: &PresenceRegistry,
    ctx: &RequestContext,
    deliveries: Deliveries,
) {
    for (recipient, event) in deliveries {
        match recipient {
            Recipient::All => {
                registry.broadcast(ctx.session_id, event, None);
            }
            Recipient::AllExcept(user_id) => {
                registry.broadcast(
                    ctx.session_id,
                    event,
                    Some(user_id),
                );
            }
            Recipient::User(user_id) => {
                if let Err(e) =
                    registry.send_to(ctx.session_id, user_id, event)
                {
                    tracing::trace!(
                        %user_id, error = %e,
                        "skipping offline recipient"
                    );
                }
            }
        }
    }
}

/// Sends one event straight down the socket. Only used before the
/// writer task exists (join failures).
async fn send_direct(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) {
    if let Ok(bytes) = codec.encode(event) {
        let _ = conn.send(&bytes).await;
    }
}
