//! WebRTC signaling relay.
//!
//! Voice and video negotiate peer-to-peer; the server only forwards
//! the handshake. Payloads are opaque JSON — never inspected, never
//! stored — and every relayed event carries `from` so the target knows
//! which peer connection it belongs to.

use loretable_presence::PresenceError;
use loretable_protocol::{
    ClientFrame, Codec, Recipient, ServerEvent, UserId,
};
use loretable_store::RecordStore;

use crate::dispatch::{Deliveries, RequestContext};
use crate::identity::IdentityResolver;
use crate::notify::LobbyNotifier;
use crate::server::ServerState;
use crate::LoretableError;

/// Claims the `rtc:*` frames; `None` for everything else.
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
    let result = match frame {
        ClientFrame::RtcOffer { target, payload } => relay(
            state,
            ctx,
            *target,
            ServerEvent::RtcOffer {
                from: ctx.user_id,
                payload: payload.clone(),
            },
        ),
        ClientFrame::RtcAnswer { target, payload } => relay(
            state,
            ctx,
            *target,
            ServerEvent::RtcAnswer {
                from: ctx.user_id,
                payload: payload.clone(),
            },
        ),
        ClientFrame::RtcIceCandidate { target, payload } => relay(
            state,
            ctx,
            *target,
            ServerEvent::RtcIceCandidate {
                from: ctx.user_id,
                payload: payload.clone(),
            },
        ),
        // Mute state is table-wide: everyone but the sender hears it.
        ClientFrame::RtcMuteState { payload } => Ok(vec![(
            Recipient::AllExcept(ctx.user_id),
            ServerEvent::RtcMuteState {
                from: ctx.user_id,
                payload: payload.clone(),
            },
        )]),
        _ => return None,
    };
    Some(result)
}

/// Targets one connected participant. A target that isn't connected
/// reads back to the sender as an error rather than vanishing.
fn relay<S, I, N, C>(
    state: &ServerState<S, I, N, C>,
    ctx: &RequestContext,
    target: UserId,
    event: ServerEvent,
) -> Result<Deliveries, LoretableError>
where
    S: RecordStore,
    I: IdentityResolver,
    N: LobbyNotifier,
    C: Codec,
{
    if state.registry.get(ctx.session_id, target).is_none() {
        return Err(PresenceError::NotConnected {
            session_id: ctx.session_id,
            user_id: target,
        }
        .into());
    }
    Ok(vec![(Recipient::User(target), event)])
}
