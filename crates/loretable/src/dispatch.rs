//! Frame dispatch: routing decoded client frames to the owning domain.
//!
//! Each domain claims its frames and returns `None` for the rest, so
//! the chain in [`dispatch`] tries them in sequence and the first
//! `Some` wins. Handlers never touch the socket: they return a list of
//! `(recipient, event)` pairs and the connection handler performs the
//! actual delivery through the presence registry.

use loretable_board::PlaceToken;
use loretable_protocol::{
    ChannelId, ClientFrame, Codec, Recipient, Role, ServerEvent,
    SessionId, UserId,
};
use loretable_store::RecordStore;

use crate::identity::IdentityResolver;
use crate::notify::LobbyNotifier;
use crate::server::ServerState;
use crate::{lifecycle, signaling, LoretableError};

/// What a handler wants delivered, in emission order.
pub(crate) type Deliveries = Vec<(Recipient, ServerEvent)>;

/// The authenticated context a frame is handled in. Fixed at join
/// time; a connection never changes session, user, or role.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestContext {
    pub(crate) session_id: SessionId,
    pub(crate) user_id: UserId,
    pub(crate) role: Role,
}

/// Routes one frame. `None` means no domain recognized it.
pub(crate) async fn dispatch<S, I, N, C>(
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
    if let Some(result) = lifecycle::handle(state, ctx, frame).await {
        return Some(result);
    }
    if let Some(result) = fog(state, ctx, frame).await {
        return Some(result);
    }
    if let Some(result) = tokens(state, ctx, frame).await {
        return Some(result);
    }
    if let Some(result) = chat(state, ctx, frame).await {
        return Some(result);
    }
    signaling::handle(state, ctx, frame).await
}

// ---------------------------------------------------------------------------
// Fog of war
// ---------------------------------------------------------------------------

async fn fog<S, I, N, C>(
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
    let result: Result<Deliveries, LoretableError> = match frame {
        ClientFrame::FogReveal { map_id, cells } => {
            async {
                let newly = state
                    .fog
                    .reveal(ctx.session_id, *map_id, ctx.role, cells.clone())
                    .await?;
                // An all-duplicate reveal changes nothing; suppress
                // the broadcast so clients never see an empty delta.
                if newly.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![(
                    Recipient::All,
                    ServerEvent::FogUpdated {
                        map_id: *map_id,
                        revealed: newly,
                    },
                )])
            }
            .await
        }
        ClientFrame::FogRevealAll { map_id } => {
            async {
                let all = state
                    .fog
                    .reveal_all(ctx.session_id, *map_id, ctx.role)
                    .await?;
                Ok(vec![(
                    Recipient::All,
                    ServerEvent::FogState {
                        map_id: *map_id,
                        revealed: all.into_iter().collect(),
                    },
                )])
            }
            .await
        }
        ClientFrame::FogHideAll { map_id } => {
            async {
                state
                    .fog
                    .hide_all(ctx.session_id, *map_id, ctx.role)
                    .await?;
                Ok(vec![(
                    Recipient::All,
                    ServerEvent::FogState {
                        map_id: *map_id,
                        revealed: Vec::new(),
                    },
                )])
            }
            .await
        }
        ClientFrame::FogGetState { map_id } => {
            async {
                let revealed =
                    state.fog.state(ctx.session_id, *map_id).await?;
                Ok(vec![(
                    Recipient::User(ctx.user_id),
                    ServerEvent::FogState {
                        map_id: *map_id,
                        revealed: revealed.into_iter().collect(),
                    },
                )])
            }
            .await
        }
        _ => return None,
    };
    Some(result)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

async fn tokens<S, I, N, C>(
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
    let result: Result<Deliveries, LoretableError> = match frame {
        ClientFrame::TokenPlace {
            map_id,
            kind,
            name,
            position,
            color,
            image,
            character_id,
        } => {
            async {
                let token = state
                    .tokens
                    .place(
                        ctx.session_id,
                        *map_id,
                        ctx.role,
                        PlaceToken {
                            kind: *kind,
                            name: name.clone(),
                            position: *position,
                            color: color.clone(),
                            image: image.clone(),
                            character_id: *character_id,
                        },
                    )
                    .await?;
                Ok(vec![(
                    Recipient::All,
                    ServerEvent::TokenPlaced { token },
                )])
            }
            .await
        }
        ClientFrame::TokenMove { token_id, position } => {
            async {
                let token = state
                    .tokens
                    .move_token(
                        ctx.session_id,
                        ctx.role,
                        *token_id,
                        *position,
                    )
                    .await?;
                Ok(vec![(
                    Recipient::All,
                    ServerEvent::TokenMoved {
                        token_id: token.id,
                        position: token.position,
                    },
                )])
            }
            .await
        }
        ClientFrame::TokenRemove { token_id } => {
            async {
                let token = state
                    .tokens
                    .remove(ctx.session_id, ctx.role, *token_id)
                    .await?;
                Ok(vec![(
                    Recipient::All,
                    ServerEvent::TokenRemoved { token_id: token.id },
                )])
            }
            .await
        }
        ClientFrame::TokenGetState { map_id } => {
            async {
                let tokens =
                    state.tokens.list(ctx.session_id, *map_id).await?;
                Ok(vec![(
                    Recipient::User(ctx.user_id),
                    ServerEvent::TokenState {
                        map_id: *map_id,
                        tokens,
                    },
                )])
            }
            .await
        }
        _ => return None,
    };
    Some(result)
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

async fn chat<S, I, N, C>(
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
    let result: Result<Deliveries, LoretableError> = match frame {
        ClientFrame::ChatSend {
            channel_id,
            content,
        } => {
            async {
                let message = state
                    .chat
                    .send_message(*channel_id, ctx.user_id, content)
                    .await?;
                // A message fans out to channel members, connected or
                // not — offline members are skipped at delivery.
                let members =
                    channel_members(state, *channel_id).await?;
                Ok(members
                    .into_iter()
                    .map(|member| {
                        (
                            Recipient::User(member),
                            ServerEvent::ChatMessageEvent {
                                message: message.clone(),
                            },
                        )
                    })
                    .collect())
            }
            .await
        }
        ClientFrame::ChatCreateChannel {
            participant_ids,
            name,
        } => {
            async {
                let outcome = state
                    .chat
                    .create_channel(
                        ctx.session_id,
                        ctx.user_id,
                        participant_ids.clone(),
                        name.clone(),
                    )
                    .await?;
                // Summaries are per-member: unread counts differ. A
                // reused two-party channel only answers the requester.
                let recipients = if outcome.created {
                    outcome.channel.member_ids()
                } else {
                    vec![ctx.user_id]
                };
                let mut deliveries = Deliveries::new();
                for member in recipients {
                    let channel = state
                        .chat
                        .summarize(&outcome.channel, member)
                        .await?;
                    deliveries.push((
                        Recipient::User(member),
                        ServerEvent::ChannelCreated { channel },
                    ));
                }
                Ok(deliveries)
            }
            .await
        }
        ClientFrame::ChatGetMessages {
            channel_id,
            before,
            limit,
        } => {
            async {
                let page = state
                    .chat
                    .messages(*channel_id, ctx.user_id, *before, *limit)
                    .await?;
                Ok(vec![(
                    Recipient::User(ctx.user_id),
                    ServerEvent::ChatMessages {
                        channel_id: *channel_id,
                        messages: page.messages,
                        has_more: page.has_more,
                    },
                )])
            }
            .await
        }
        ClientFrame::ChatMarkRead { channel_id } => {
            async {
                state.chat.mark_read(*channel_id, ctx.user_id).await?;
                Ok(Vec::new())
            }
            .await
        }
        _ => return None,
    };
    Some(result)
}

/// Member ids of a channel, for message fan-out.
async fn channel_members<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    channel_id: ChannelId,
) -> Result<Vec<UserId>, LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    Ok(state
        .store
        .channel(channel_id)
        .await?
        .map(|channel| channel.member_ids())
        .unwrap_or_default())
}
