//! The lobby notification seam.
//!
//! The hosting platform usually keeps a campaign lobby or session list
//! outside the live engine. A [`LobbyNotifier`] is told whenever a
//! session's durable metadata changes so that outer surface can stay
//! current. Notifications are fire-and-forget: delivery failures are
//! the implementation's problem and never block the session.

use loretable_protocol::{SessionId, SessionSnapshot};

/// Receives session metadata changes.
///
/// The returned futures must be `Send`: notifications fire from
/// spawned per-connection tasks.
pub trait LobbyNotifier: Send + Sync + 'static {
    /// The session's status or active display changed.
    fn session_updated(
        &self,
        session: &SessionSnapshot,
    ) -> impl Future<Output = ()> + Send;

    /// The session reached its terminal `ended` status.
    fn session_ended(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = ()> + Send;
}

/// A notifier that drops every notification. The default for servers
/// with no lobby to keep current.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl LobbyNotifier for NullNotifier {
    async fn session_updated(&self, _session: &SessionSnapshot) {}

    async fn session_ended(&self, _session_id: SessionId) {}
}
