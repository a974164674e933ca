//! Per-map write serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use loretable_protocol::{MapId, SessionId};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per (session, map), created on first use.
///
/// The services compute their writes from a prior read (merge a fog
/// delta, check the party-token invariant). Holding this lock across
/// the read and the write keeps two concurrent mutations of the same
/// map from both working off the same stale read and silently losing
/// one of them.
#[derive(Default)]
pub(crate) struct MapLocks {
    locks: Mutex<HashMap<(SessionId, MapId), Arc<AsyncMutex<()>>>>,
}

impl MapLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Takes the write lock for one map, waiting behind any holder.
    pub(crate) async fn acquire(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks.entry((session_id, map_id)).or_default(),
            )
        };
        lock.lock_owned().await
    }
}
