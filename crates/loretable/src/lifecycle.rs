//! Session lifecycle: the connect and disconnect sequences, and the
//! DM's display and status controls.
//!
//! Connect is the one place a client gets its full picture of the
//! session: snapshot, roster, fog and token state for the active map,
//! and the caller's channel list, in that order. Everything after is
//! incremental. Disconnect undoes the presence side and leaves the
//! durable participation record behind so the user can rejoin.

use loretable_presence::{OutboundSender, Participant};
use loretable_protocol::{
    ClientFrame, Codec, MapId, Recipient, Role, ServerEvent, SessionId,
    SessionStatus, UserId,
};
use loretable_store::{
    ParticipationRecord, RecordStore, SessionRecord, now_ms,
};
use loretable_transport::ConnectionId;

use crate::dispatch::{Deliveries, RequestContext};
use crate::identity::{Identity, IdentityResolver};
use crate::notify::LobbyNotifier;
use crate::server::ServerState;
use crate::LoretableError;

/// Errors in the connect sequence and the DM's session controls.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A non-DM attempted a DM-only control.
    #[error("only the DM may do that")]
    DmOnly,

    /// Joins and mutations are refused once a session has ended.
    #[error("session {0} has ended")]
    SessionEnded(SessionId),

    /// The requested status is not reachable from the current one.
    #[error("cannot move session from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current status.
        from: SessionStatus,
        /// Requested status.
        to: SessionStatus,
    },

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] loretable_store::StoreError),
}

// ---------------------------------------------------------------------------
// Connect / disconnect
// ---------------------------------------------------------------------------

/// Runs the connect sequence for a freshly joined connection.
///
/// On success the connection is registered in the presence registry
/// and has been sent its snapshots; the rest of the session has been
/// told about the arrival. A reconnect supersedes the user's previous
/// connection silently: the old socket is closed with no disconnect
/// side effects.
pub(crate) async fn connect<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    session_id: SessionId,
    identity: Identity,
    connection_id: ConnectionId,
    sender: OutboundSender,
) -> Result<(), LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    let session = state
        .store
        .session(session_id)
        .await
        .map_err(LifecycleError::Store)?;
    if session.status == SessionStatus::Ended {
        return Err(LifecycleError::SessionEnded(session_id).into());
    }

    // Durable participation: reactivate the previous record if the
    // user has been here before, otherwise create one.
    let record = match state
        .store
        .participation(session_id, identity.user_id)
        .await
        .map_err(LifecycleError::Store)?
    {
        Some(mut record) => {
            record.left = false;
            record.display_name = identity.display_name.clone();
            record.avatar = identity.avatar.clone();
            record.role = identity.role;
            record.character_id = identity.character_id;
            record.character_name = identity.character_name.clone();
            record
        }
        None => ParticipationRecord {
            session_id,
            user_id: identity.user_id,
            display_name: identity.display_name.clone(),
            avatar: identity.avatar.clone(),
            role: identity.role,
            character_id: identity.character_id,
            character_name: identity.character_name.clone(),
            left: false,
            joined_at_ms: now_ms(),
        },
    };
    state
        .store
        .upsert_participation(record)
        .await
        .map_err(LifecycleError::Store)?;

    let participant = Participant::new(
        session_id,
        identity.user_id,
        identity.display_name.clone(),
        identity.avatar.clone(),
        identity.role,
        identity.character_id,
        identity.character_name.clone(),
        connection_id,
        sender,
    );
    let summary = participant.summary();
    if let Some(old) = state.registry.register(participant) {
        old.close();
    }

    // The rest of the sequence can still fail on the store. Undo the
    // registration on that path, or the roster keeps a ghost entry
    // until the liveness sweep evicts it.
    if let Err(e) =
        sync_new_connection(state, &session, identity.user_id).await
    {
        state.registry.unregister(
            session_id,
            identity.user_id,
            connection_id,
        );
        return Err(e);
    }

    // The rest of the session learns about the arrival.
    state.registry.broadcast(
        session_id,
        ServerEvent::UserConnected {
            participant: summary,
        },
        Some(identity.user_id),
    );

    // Player joins leave a trace in the main channel; DM arrivals
    // don't (the DM opening their own session is not table news).
    if identity.role == Role::Player {
        announce_system(
            state,
            session_id,
            identity.user_id,
            &format!("{} joined the session", identity.display_name),
        )
        .await;
    }

    tracing::info!(
        %session_id, user_id = %identity.user_id, %connection_id,
        role = ?identity.role, "participant connected"
    );
    Ok(())
}

/// Sends a freshly registered connection its snapshots: session state
/// with roster, fog and token state for the active map, and the
/// caller's channel list (after main-channel membership is recorded).
async fn sync_new_connection<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    session: &SessionRecord,
    user_id: UserId,
) -> Result<(), LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    let session_id = session.id;
    let _ = state.registry.send_to(
        session_id,
        user_id,
        ServerEvent::SessionState {
            session: session.snapshot(),
            participants: state.registry.roster(session_id),
        },
    );
    if let Some(map_id) = session.active_map_id {
        let revealed = state.fog.state(session_id, map_id).await?;
        let _ = state.registry.send_to(
            session_id,
            user_id,
            ServerEvent::FogState {
                map_id,
                revealed: revealed.into_iter().collect(),
            },
        );
        let tokens = state.tokens.list(session_id, map_id).await?;
        let _ = state.registry.send_to(
            session_id,
            user_id,
            ServerEvent::TokenState { map_id, tokens },
        );
    }

    state.chat.add_to_main(session_id, user_id).await?;
    let channels =
        state.chat.list_channels(session_id, user_id).await?;
    let _ = state.registry.send_to(
        session_id,
        user_id,
        ServerEvent::ChatChannels { channels },
    );
    Ok(())
}

/// Runs the disconnect sequence for a closed connection.
///
/// Identity-checked: when the user already reconnected, the registry
/// still holds the newer connection and this is a stale disconnect to
/// ignore entirely.
pub(crate) async fn disconnect<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    session_id: SessionId,
    user_id: UserId,
    connection_id: ConnectionId,
) where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    let Some(removed) =
        state.registry.unregister(session_id, user_id, connection_id)
    else {
        return;
    };

    state.registry.broadcast(
        session_id,
        ServerEvent::UserDisconnected { user_id },
        None,
    );

    if removed.role == Role::Player {
        announce_system(
            state,
            session_id,
            user_id,
            &format!("{} left the session", removed.display_name),
        )
        .await;
        if let Err(e) =
            state.chat.remove_from_main(session_id, user_id).await
        {
            tracing::warn!(
                %session_id, %user_id, error = %e,
                "failed to remove leaver from main channel"
            );
        }
        match state.store.participation(session_id, user_id).await {
            Ok(Some(mut record)) => {
                record.left = true;
                if let Err(e) =
                    state.store.upsert_participation(record).await
                {
                    tracing::warn!(
                        %session_id, %user_id, error = %e,
                        "failed to mark participation left"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(
                %session_id, %user_id, error = %e,
                "failed to load participation on disconnect"
            ),
        }
    }

    tracing::info!(
        %session_id, %user_id, %connection_id,
        "participant disconnected"
    );
}

/// Writes a system notice to the main channel and fans it out to
/// connected members. Best effort: a store failure is logged and the
/// sequence continues — presence must never be blocked on chat.
async fn announce_system<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    session_id: SessionId,
    actor: UserId,
    content: &str,
) where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    let result = async {
        let main = state.store.main_channel(session_id).await?;
        let message = state
            .chat
            .send_system_message(main.id, actor, content)
            .await?;
        Ok::<_, loretable_chat::ChatError>((main, message))
    }
    .await;

    match result {
        Ok((main, message)) => {
            for member in main.member_ids() {
                let _ = state.registry.send_to(
                    session_id,
                    member,
                    ServerEvent::ChatMessageEvent {
                        message: message.clone(),
                    },
                );
            }
        }
        Err(e) => tracing::warn!(
            %session_id, %actor, error = %e,
            "failed to record session notice"
        ),
    }
}

// ---------------------------------------------------------------------------
// DM display & status controls
// ---------------------------------------------------------------------------

/// Claims the `session:*` control frames; `None` for everything else.
pub(crate) async fn handle<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    ctx: &RequestContext,
    frame: &ClientFrame,
) -> Option<Result<Deliveries, LoretableError>>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    match frame {
        ClientFrame::SetMap { map_id } => {
            Some(set_map(state, ctx, *map_id).await)
        }
        ClientFrame::SetBackdrop { backdrop_id } => {
            Some(set_display(state, ctx, None, Some(*backdrop_id)).await)
        }
        ClientFrame::ClearDisplay => {
            Some(set_display(state, ctx, None, None).await)
        }
        ClientFrame::SetStatus { status } => {
            Some(set_status(state, ctx, *status).await)
        }
        _ => None,
    }
}

/// Activates a map and pushes its fog and token state to everyone.
async fn set_map<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    ctx: &RequestContext,
    map_id: MapId,
) -> Result<Deliveries, LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    // Load the board state first: this also validates that the map
    // exists and belongs to the session before the record is touched.
    require_dm(ctx)?;
    let revealed = state.fog.state(ctx.session_id, map_id).await?;
    let tokens = state.tokens.list(ctx.session_id, map_id).await?;

    let session =
        update_display(state, ctx, Some(map_id), None).await?;
    Ok(vec![
        (
            Recipient::All,
            ServerEvent::SessionUpdated {
                session: session.snapshot(),
            },
        ),
        (
            Recipient::All,
            ServerEvent::FogState {
                map_id,
                revealed: revealed.into_iter().collect(),
            },
        ),
        (
            Recipient::All,
            ServerEvent::TokenState { map_id, tokens },
        ),
    ])
}

/// Activates a backdrop, or clears the display entirely.
async fn set_display<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    ctx: &RequestContext,
    map_id: Option<MapId>,
    backdrop_id: Option<loretable_protocol::BackdropId>,
) -> Result<Deliveries, LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    require_dm(ctx)?;
    let session =
        update_display(state, ctx, map_id, backdrop_id).await?;
    Ok(vec![(
        Recipient::All,
        ServerEvent::SessionUpdated {
            session: session.snapshot(),
        },
    )])
}

/// Persists a display change. Map and backdrop are mutually exclusive;
/// whichever is set evicts the other.
async fn update_display<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    ctx: &RequestContext,
    map_id: Option<MapId>,
    backdrop_id: Option<loretable_protocol::BackdropId>,
) -> Result<SessionRecord, LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    let mut session = state
        .store
        .session(ctx.session_id)
        .await
        .map_err(LifecycleError::Store)?;
    if session.status == SessionStatus::Ended {
        return Err(LifecycleError::SessionEnded(session.id).into());
    }
    session.active_map_id = map_id;
    session.active_backdrop_id = backdrop_id;
    session.updated_at_ms = now_ms();
    state
        .store
        .update_session(session.clone())
        .await
        .map_err(LifecycleError::Store)?;
    state.notifier.session_updated(&session.snapshot()).await;
    tracing::debug!(
        session_id = %session.id, ?map_id, ?backdrop_id,
        "session display changed"
    );
    Ok(session)
}

/// Moves the session through its status machine.
async fn set_status<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    ctx: &RequestContext,
    status: SessionStatus,
) -> Result<Deliveries, LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    require_dm(ctx)?;
    let mut session = state
        .store
        .session(ctx.session_id)
        .await
        .map_err(LifecycleError::Store)?;
    if !session.status.can_transition_to(status) {
        return Err(LifecycleError::InvalidTransition {
            from: session.status,
            to: status,
        }
        .into());
    }
    session.status = status;
    session.updated_at_ms = now_ms();
    state
        .store
        .update_session(session.clone())
        .await
        .map_err(LifecycleError::Store)?;

    state.notifier.session_updated(&session.snapshot()).await;
    if status == SessionStatus::Ended {
        state.notifier.session_ended(session.id).await;
    }
    tracing::info!(
        session_id = %session.id, ?status, "session status changed"
    );
    Ok(vec![(
        Recipient::All,
        ServerEvent::SessionUpdated {
            session: session.snapshot(),
        },
    )])
}

fn require_dm(ctx: &RequestContext) -> Result<(), LoretableError> {
    if ctx.role.is_dm() {
        Ok(())
    } else {
        Err(LifecycleError::DmOnly.into())
    }
}
