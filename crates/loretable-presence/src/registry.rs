//! The presence registry: who is connected to which session, and how
//! to reach them.
//!
//! Purely in-memory; nothing here survives a restart. Each participant
//! carries an unbounded mpsc sender as its transport handle, so every
//! registry operation — including fan-out — is synchronous and
//! non-blocking: the actual socket writes happen in each connection's
//! writer task, which drains the channel in emission order.
//!
//! Per-session state sits behind one lock, so concurrent
//! connect/disconnect/broadcast for a session serialize; operations on
//! different sessions only share the brief outer map access.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use loretable_protocol::{
    CharacterId, ParticipantSummary, Role, ServerEvent, SessionId, UserId,
};
use loretable_transport::ConnectionId;

use crate::PresenceError;

/// What flows to a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// An event to encode and send to the peer.
    Event(ServerEvent),
    /// Close the socket and stop the writer. Sent when this connection
    /// is superseded by a reconnect or evicted by the liveness sweep.
    Close,
}

/// Sending half of a connection's outbound channel.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// A live participant: identity, role, and the handle to reach their
/// connection.
#[derive(Debug, Clone)]
pub struct Participant {
    /// The session they are connected to.
    pub session_id: SessionId,
    /// Who they are.
    pub user_id: UserId,
    /// Name shown to others.
    pub display_name: String,
    /// Avatar URL, if set.
    pub avatar: Option<String>,
    /// DM or player.
    pub role: Role,
    /// Bound character record (players only).
    pub character_id: Option<CharacterId>,
    /// Bound character's name (players only).
    pub character_name: Option<String>,
    /// Identity of the underlying connection. Compared at unregister
    /// time to make stale disconnects a no-op.
    pub connection_id: ConnectionId,
    /// When this connection registered.
    pub connected_at: Instant,
    /// Last liveness signal (connect, ping). Drives the sweep.
    pub last_seen: Instant,
    sender: OutboundSender,
}

impl Participant {
    /// Creates a participant for a freshly established connection.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        display_name: String,
        avatar: Option<String>,
        role: Role,
        character_id: Option<CharacterId>,
        character_name: Option<String>,
        connection_id: ConnectionId,
        sender: OutboundSender,
    ) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            user_id,
            display_name,
            avatar,
            role,
            character_id,
            character_name,
            connection_id,
            connected_at: now,
            last_seen: now,
            sender,
        }
    }

    /// The wire-facing view of this participant.
    pub fn summary(&self) -> ParticipantSummary {
        ParticipantSummary {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
            role: self.role,
            character_id: self.character_id,
            character_name: self.character_name.clone(),
        }
    }

    /// Queues an event for this connection. Returns `false` when the
    /// writer task is gone (connection already dead).
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(Outbound::Event(event)).is_ok()
    }

    /// Tells this connection's writer task to close the socket.
    pub fn close(&self) -> bool {
        self.sender.send(Outbound::Close).is_ok()
    }
}

/// In-memory mapping of session → participant → live connection.
///
/// An injected, explicitly-owned service: the server creates one and
/// hands out `Arc`s, so lifecycle and test isolation stay explicit.
#[derive(Default)]
pub struct PresenceRegistry {
    sessions: RwLock<HashMap<SessionId, HashMap<UserId, Participant>>>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> RwLockReadGuard<'_, HashMap<SessionId, HashMap<UserId, Participant>>>
    {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<SessionId, HashMap<UserId, Participant>>>
    {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a participant's connection.
    ///
    /// Exactly one connection per (session, user) is authoritative: if
    /// one is already registered, the new one silently supersedes it
    /// and the old participant is returned so the caller can close its
    /// socket — without any disconnect side effects.
    pub fn register(&self, participant: Participant) -> Option<Participant> {
        let session_id = participant.session_id;
        let user_id = participant.user_id;
        let superseded = self
            .write()
            .entry(session_id)
            .or_default()
            .insert(user_id, participant);
        if superseded.is_some() {
            tracing::debug!(
                %session_id, %user_id,
                "connection superseded by a newer one"
            );
        }
        superseded
    }

    /// Removes a participant, but only when `connection_id` still
    /// matches the registered connection. A stale disconnect (the user
    /// already reconnected) is a no-op and returns `None`.
    ///
    /// When the last participant leaves, the session entry itself is
    /// removed.
    pub fn unregister(
        &self,
        session_id: SessionId,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Option<Participant> {
        let mut sessions = self.write();
        let session = sessions.get_mut(&session_id)?;
        let current = session.get(&user_id)?;
        if current.connection_id != connection_id {
            tracing::debug!(
                %session_id, %user_id, %connection_id,
                "ignoring stale disconnect"
            );
            return None;
        }
        let removed = session.remove(&user_id);
        if session.is_empty() {
            sessions.remove(&session_id);
        }
        removed
    }

    /// Looks up one participant.
    pub fn get(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Option<Participant> {
        self.read().get(&session_id)?.get(&user_id).cloned()
    }

    /// Every participant in a session.
    pub fn list_all(&self, session_id: SessionId) -> Vec<Participant> {
        self.read()
            .get(&session_id)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The session roster as wire summaries, sorted by user id.
    pub fn roster(&self, session_id: SessionId) -> Vec<ParticipantSummary> {
        let mut roster: Vec<ParticipantSummary> = self
            .list_all(session_id)
            .iter()
            .map(Participant::summary)
            .collect();
        roster.sort_by_key(|p| p.user_id);
        roster
    }

    /// Refreshes a participant's liveness deadline. Returns `false`
    /// when the participant is not registered.
    pub fn touch_liveness(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> bool {
        let mut sessions = self.write();
        match sessions
            .get_mut(&session_id)
            .and_then(|s| s.get_mut(&user_id))
        {
            Some(p) => {
                p.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Delivers an event to one participant.
    pub fn send_to(
        &self,
        session_id: SessionId,
        user_id: UserId,
        event: ServerEvent,
    ) -> Result<(), PresenceError> {
        let participant = self
            .get(session_id, user_id)
            .ok_or(PresenceError::NotConnected { session_id, user_id })?;
        if participant.send(event) {
            Ok(())
        } else {
            Err(PresenceError::Unreachable { session_id, user_id })
        }
    }

    /// Delivers an event to every participant in a session, optionally
    /// excluding one (typically the sender).
    ///
    /// Dead connections are skipped, never raised: a recipient whose
    /// writer task is gone does not abort delivery to the rest. Returns
    /// the number of successful deliveries.
    pub fn broadcast(
        &self,
        session_id: SessionId,
        event: ServerEvent,
        exclude: Option<UserId>,
    ) -> usize {
        let sessions = self.read();
        let Some(session) = sessions.get(&session_id) else {
            return 0;
        };
        let mut delivered = 0;
        for (user_id, participant) in session {
            if Some(*user_id) == exclude {
                continue;
            }
            if participant.send(event.clone()) {
                delivered += 1;
            } else {
                tracing::trace!(
                    %session_id, %user_id,
                    "skipping dead connection during broadcast"
                );
            }
        }
        delivered
    }

    /// Removes every participant whose last liveness signal is older
    /// than `timeout`, closing their connections. Sessions left empty
    /// are dropped. Returns the evicted participants so the caller can
    /// announce the disconnects.
    pub fn evict_idle(&self, timeout: Duration) -> Vec<Participant> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        let mut sessions = self.write();
        sessions.retain(|session_id, session| {
            session.retain(|user_id, participant| {
                let idle = now.duration_since(participant.last_seen);
                if idle < timeout {
                    return true;
                }
                tracing::info!(
                    %session_id, %user_id, idle_secs = idle.as_secs(),
                    "evicting silent connection"
                );
                participant.close();
                evicted.push(participant.clone());
                false
            });
            !session.is_empty()
        });
        evicted
    }

    /// Number of sessions with at least one participant.
    pub fn session_count(&self) -> usize {
        self.read().len()
    }

    /// Number of participants in one session.
    pub fn participant_count(&self, session_id: SessionId) -> usize {
        self.read().get(&session_id).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn participant(
        session: u64,
        user: u64,
        conn: u64,
    ) -> (Participant, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let p = Participant::new(
            SessionId(session),
            UserId(user),
            format!("user-{user}"),
            None,
            Role::Player,
            None,
            None,
            ConnectionId::new(conn),
            tx,
        );
        (p, rx)
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = PresenceRegistry::new();
        let (p, _rx) = participant(1, 10, 100);
        assert!(registry.register(p).is_none());

        let found = registry.get(SessionId(1), UserId(10)).unwrap();
        assert_eq!(found.connection_id, ConnectionId::new(100));
        assert_eq!(registry.participant_count(SessionId(1)), 1);
    }

    #[tokio::test]
    async fn test_newer_connection_supersedes_older() {
        let registry = PresenceRegistry::new();
        let (old, _old_rx) = participant(1, 10, 100);
        let (new, _new_rx) = participant(1, 10, 101);

        assert!(registry.register(old).is_none());
        let superseded = registry.register(new).unwrap();
        assert_eq!(superseded.connection_id, ConnectionId::new(100));

        // Still exactly one participant, the newer connection.
        assert_eq!(registry.participant_count(SessionId(1)), 1);
        let current = registry.get(SessionId(1), UserId(10)).unwrap();
        assert_eq!(current.connection_id, ConnectionId::new(101));
    }

    #[tokio::test]
    async fn test_stale_unregister_is_a_noop() {
        let registry = PresenceRegistry::new();
        let (old, _old_rx) = participant(1, 10, 100);
        let (new, _new_rx) = participant(1, 10, 101);
        registry.register(old);
        registry.register(new);

        // The old connection's disconnect arrives late.
        let removed = registry.unregister(
            SessionId(1),
            UserId(10),
            ConnectionId::new(100),
        );
        assert!(removed.is_none(), "stale disconnect must not evict");
        assert_eq!(registry.participant_count(SessionId(1)), 1);

        // The live connection's disconnect still works.
        let removed = registry.unregister(
            SessionId(1),
            UserId(10),
            ConnectionId::new(101),
        );
        assert!(removed.is_some());
    }

    #[tokio::test]
    async fn test_last_unregister_removes_session_entry() {
        let registry = PresenceRegistry::new();
        let (p, _rx) = participant(1, 10, 100);
        registry.register(p);
        assert_eq!(registry.session_count(), 1);

        registry.unregister(SessionId(1), UserId(10), ConnectionId::new(100));
        assert_eq!(registry.session_count(), 0, "no leak of empty maps");
    }

    #[tokio::test]
    async fn test_broadcast_excludes_and_skips_dead() {
        let registry = PresenceRegistry::new();
        let (a, mut a_rx) = participant(1, 1, 100);
        let (b, mut b_rx) = participant(1, 2, 101);
        let (c, c_rx) = participant(1, 3, 102);
        registry.register(a);
        registry.register(b);
        registry.register(c);
        drop(c_rx); // c's writer task is gone

        let delivered = registry.broadcast(
            SessionId(1),
            ServerEvent::Pong,
            Some(UserId(1)),
        );
        assert_eq!(delivered, 1, "b only: a excluded, c dead");
        assert_eq!(b_rx.try_recv().unwrap(), Outbound::Event(ServerEvent::Pong));
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_unknown_user_errors() {
        let registry = PresenceRegistry::new();
        let result =
            registry.send_to(SessionId(1), UserId(9), ServerEvent::Pong);
        assert!(matches!(
            result,
            Err(PresenceError::NotConnected { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_removes_only_silent_connections() {
        let registry = PresenceRegistry::new();
        let (quiet, mut quiet_rx) = participant(1, 1, 100);
        let (chatty, _chatty_rx) = participant(1, 2, 101);
        registry.register(quiet);
        registry.register(chatty);

        tokio::time::advance(Duration::from_secs(90)).await;
        registry.touch_liveness(SessionId(1), UserId(2));
        tokio::time::advance(Duration::from_secs(40)).await;

        // quiet has been idle 130s, chatty only 40s.
        let evicted = registry.evict_idle(Duration::from_secs(120));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].user_id, UserId(1));
        assert_eq!(quiet_rx.try_recv().unwrap(), Outbound::Close);
        assert_eq!(registry.participant_count(SessionId(1)), 1);
    }
}
