//! Liveness sweep: the background task that evicts silent connections.
//!
//! A client that stops sending `ping` frames (crashed browser tab,
//! dropped network) never delivers a clean close. The sweeper wakes on
//! a fixed interval, evicts every connection past the liveness timeout,
//! and announces the disconnects to the rest of each session.
//!
//! The task is owned: [`LivenessSweeper::spawn`] returns a handle and
//! [`LivenessSweeper::shutdown`] stops it, so server shutdown and test
//! isolation stay explicit instead of leaking a detached interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use loretable_protocol::ServerEvent;

use crate::PresenceRegistry;

/// Timing knobs for presence liveness.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// How long a connection may stay silent before the sweep evicts
    /// it. Default: 120 seconds.
    pub liveness_timeout: Duration,
    /// How often the sweep runs. Default: 30 seconds.
    pub sweep_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Handle to the running sweep task. Dropping the handle aborts the
/// task; [`shutdown`](Self::shutdown) stops it gracefully.
pub struct LivenessSweeper {
    handle: Option<JoinHandle<()>>,
    stop: watch::Sender<bool>,
}

impl LivenessSweeper {
    /// Starts the sweep over the given registry.
    pub fn spawn(
        registry: Arc<PresenceRegistry>,
        config: PresenceConfig,
    ) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick fires immediately; consume it so
            // the first sweep happens one full interval after spawn.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_once(&registry, config.liveness_timeout);
                    }
                    _ = stopped.changed() => {
                        tracing::debug!("liveness sweeper stopping");
                        break;
                    }
                }
            }
        });
        Self {
            handle: Some(handle),
            stop,
        }
    }

    /// Stops the sweep and waits for the task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for LivenessSweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One sweep pass: evict, then announce.
///
/// A timeout eviction broadcasts `user:disconnected` but deliberately
/// skips the "player left" chat messaging a voluntary disconnect gets:
/// the player never chose to leave and will usually reconnect, at
/// which point the identity check makes their stale state harmless.
fn sweep_once(registry: &PresenceRegistry, timeout: Duration) {
    let evicted = registry.evict_idle(timeout);
    for participant in evicted {
        registry.broadcast(
            participant.session_id,
            ServerEvent::UserDisconnected {
                user_id: participant.user_id,
            },
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Outbound, Participant};
    use loretable_protocol::{Role, SessionId, UserId};
    use loretable_transport::ConnectionId;
    use tokio::sync::mpsc;

    fn join(
        registry: &PresenceRegistry,
        user: u64,
        conn: u64,
    ) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(Participant::new(
            SessionId(1),
            UserId(user),
            format!("user-{user}"),
            None,
            Role::Player,
            None,
            None,
            ConnectionId::new(conn),
            tx,
        ));
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_and_announces() {
        let registry = Arc::new(PresenceRegistry::new());
        let sweeper = LivenessSweeper::spawn(
            Arc::clone(&registry),
            PresenceConfig {
                liveness_timeout: Duration::from_secs(120),
                sweep_interval: Duration::from_secs(30),
            },
        );

        let mut silent_rx = join(&registry, 1, 100);
        let mut alive_rx = join(&registry, 2, 101);

        // Keep user 2 alive past the timeout, let user 1 go silent.
        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(30)).await;
            tokio::task::yield_now().await;
            registry.touch_liveness(SessionId(1), UserId(2));
        }

        assert_eq!(registry.participant_count(SessionId(1)), 1);
        assert_eq!(silent_rx.recv().await.unwrap(), Outbound::Close);

        // The survivor heard about the eviction.
        let announced = alive_rx.recv().await.unwrap();
        assert_eq!(
            announced,
            Outbound::Event(ServerEvent::UserDisconnected {
                user_id: UserId(1)
            })
        );

        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_task() {
        let registry = Arc::new(PresenceRegistry::new());
        let sweeper = LivenessSweeper::spawn(
            Arc::clone(&registry),
            PresenceConfig::default(),
        );
        sweeper.shutdown().await;

        // With the sweeper gone, silent connections stay registered.
        let _rx = join(&registry, 1, 100);
        tokio::time::advance(Duration::from_secs(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.participant_count(SessionId(1)), 1);
    }
}
