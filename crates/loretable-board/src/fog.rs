//! Fog-of-war state service.
//!
//! Per (session, map), a set of grid cells revealed to players. The set
//! only grows under DM action (`reveal`, `reveal_all`) or resets to
//! empty (`hide_all`); reveals are idempotent, so clients applying
//! optimistic local reveals can always reconcile against server truth.
//! State is persisted, surviving reconnects and map switches.

use std::collections::HashSet;
use std::sync::Arc;

use loretable_protocol::{Cell, GridKind, MapId, Role, SessionId};
use loretable_store::{MapRecord, RecordStore, StoreError};

use crate::locks::MapLocks;
use crate::BoardError;

/// The fog-of-war service. Cheap to clone; state lives in the store.
pub struct FogService<S> {
    store: Arc<S>,
    locks: Arc<MapLocks>,
}

impl<S> Clone for FogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: RecordStore> FogService<S> {
    /// Creates a fog service over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: Arc::new(MapLocks::new()),
        }
    }

    /// Loads the map and verifies it belongs to the session. A map
    /// from another session reads as not-found.
    async fn checked_map(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> Result<MapRecord, BoardError> {
        let map = match self.store.map(map_id).await {
            Ok(map) => map,
            Err(StoreError::MapNotFound(id)) => {
                return Err(BoardError::MapNotFound(id));
            }
            Err(e) => return Err(BoardError::Store(e)),
        };
        if map.session_id != session_id {
            return Err(BoardError::MapNotFound(map_id));
        }
        Ok(map)
    }

    /// The full revealed set. Open to any session member.
    pub async fn state(
        &self,
        session_id: SessionId,
        map_id: MapId,
    ) -> Result<HashSet<Cell>, BoardError> {
        self.checked_map(session_id, map_id).await?;
        Ok(self.store.fog_cells(session_id, map_id).await?)
    }

    /// Reveals the given cells; DM-only.
    ///
    /// Returns only the cells that were not already revealed — an
    /// empty result tells the caller to suppress the broadcast.
    pub async fn reveal(
        &self,
        session_id: SessionId,
        map_id: MapId,
        actor: Role,
        cells: Vec<Cell>,
    ) -> Result<Vec<Cell>, BoardError> {
        if !actor.is_dm() {
            return Err(BoardError::DmOnly);
        }
        let map = self.checked_map(session_id, map_id).await?;
        for cell in &cells {
            if !cell_matches_grid(cell, map.grid) {
                return Err(BoardError::WrongGrid);
            }
        }

        // The merge is computed from a read; serialize against other
        // writers to the same map so no acknowledged reveal is lost.
        let _guard = self.locks.acquire(session_id, map_id).await;
        let mut revealed =
            self.store.fog_cells(session_id, map_id).await?;
        let mut newly = Vec::new();
        for cell in cells {
            if revealed.insert(cell) {
                newly.push(cell);
            }
        }
        if !newly.is_empty() {
            self.store
                .replace_fog_cells(session_id, map_id, revealed)
                .await?;
            tracing::debug!(
                %session_id, %map_id, count = newly.len(),
                "fog cells revealed"
            );
        }
        Ok(newly)
    }

    /// Reveals the map's entire coordinate space; DM-only. Returns the
    /// full set for broadcasting.
    pub async fn reveal_all(
        &self,
        session_id: SessionId,
        map_id: MapId,
        actor: Role,
    ) -> Result<HashSet<Cell>, BoardError> {
        if !actor.is_dm() {
            return Err(BoardError::DmOnly);
        }
        let map = self.checked_map(session_id, map_id).await?;
        let all = full_coverage(&map);
        let _guard = self.locks.acquire(session_id, map_id).await;
        self.store
            .replace_fog_cells(session_id, map_id, all.clone())
            .await?;
        tracing::debug!(%session_id, %map_id, "fog fully revealed");
        Ok(all)
    }

    /// Clears the revealed set to empty; DM-only.
    pub async fn hide_all(
        &self,
        session_id: SessionId,
        map_id: MapId,
        actor: Role,
    ) -> Result<(), BoardError> {
        if !actor.is_dm() {
            return Err(BoardError::DmOnly);
        }
        self.checked_map(session_id, map_id).await?;
        let _guard = self.locks.acquire(session_id, map_id).await;
        self.store
            .replace_fog_cells(session_id, map_id, HashSet::new())
            .await?;
        tracing::debug!(%session_id, %map_id, "fog fully hidden");
        Ok(())
    }
}

/// Whether a cell's coordinate family matches the map's grid.
pub(crate) fn cell_matches_grid(cell: &Cell, grid: GridKind) -> bool {
    matches!(
        (cell, grid),
        (Cell::Square { .. }, GridKind::Square)
            | (Cell::Hex { .. }, GridKind::Hex)
    )
}

/// Every cell of a map's declared width×height.
///
/// Hex maps are rectangular in odd-r offset rows; offset coordinates
/// convert to axial as `q = col - row/2, r = row`.
fn full_coverage(map: &MapRecord) -> HashSet<Cell> {
    let mut cells =
        HashSet::with_capacity((map.width * map.height) as usize);
    for row in 0..map.height as i32 {
        for col in 0..map.width as i32 {
            let cell = match map.grid {
                GridKind::Square => Cell::Square { col, row },
                GridKind::Hex => Cell::Hex {
                    q: col - row / 2,
                    r: row,
                },
            };
            cells.insert(cell);
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use loretable_protocol::UserId;
    use loretable_store::MemoryStore;

    async fn setup(grid: GridKind) -> (FogService<MemoryStore>, SessionId, MapId) {
        let store = Arc::new(MemoryStore::new());
        let session = store.create_session("s", UserId(1)).await;
        let map = store.create_map(session.id, "m", grid, 3, 2).await;
        (FogService::new(store), session.id, map.id)
    }

    #[tokio::test]
    async fn test_reveal_returns_only_new_cells() {
        let (fog, session, map) = setup(GridKind::Square).await;
        let cells = vec![
            Cell::Square { col: 0, row: 0 },
            Cell::Square { col: 1, row: 0 },
        ];

        let newly = fog
            .reveal(session, map, Role::Dm, cells.clone())
            .await
            .unwrap();
        assert_eq!(newly.len(), 2);

        // Revealing again: nothing new, no duplicated membership.
        let newly =
            fog.reveal(session, map, Role::Dm, cells).await.unwrap();
        assert!(newly.is_empty());
        assert_eq!(fog.state(session, map).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reveal_all_covers_declared_square_space() {
        let (fog, session, map) = setup(GridKind::Square).await;
        let all = fog.reveal_all(session, map, Role::Dm).await.unwrap();
        assert_eq!(all.len(), 6); // 3 × 2
        assert!(all.contains(&Cell::Square { col: 2, row: 1 }));
        assert_eq!(fog.state(session, map).await.unwrap(), all);
    }

    #[tokio::test]
    async fn test_reveal_all_hex_uses_axial_coordinates() {
        let (fog, session, map) = setup(GridKind::Hex).await;
        let all = fog.reveal_all(session, map, Role::Dm).await.unwrap();
        assert_eq!(all.len(), 6);
        // Row 1 is offset: col 0 of row 1 is axial (0 - 0, 1) = (0, 1),
        // but row 2 would shift. For row 1: q = col - 0.
        assert!(all.contains(&Cell::Hex { q: 0, r: 0 }));
        assert!(all.contains(&Cell::Hex { q: 2, r: 0 }));
        assert!(all.contains(&Cell::Hex { q: 0, r: 1 }));
        // No square cells ever appear for a hex map.
        assert!(!all.contains(&Cell::Square { col: 0, row: 0 }));
    }

    #[tokio::test]
    async fn test_hide_all_clears_everything() {
        let (fog, session, map) = setup(GridKind::Square).await;
        fog.reveal_all(session, map, Role::Dm).await.unwrap();
        fog.hide_all(session, map, Role::Dm).await.unwrap();
        assert!(fog.state(session, map).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_are_dm_only() {
        let (fog, session, map) = setup(GridKind::Square).await;
        let cells = vec![Cell::Square { col: 0, row: 0 }];

        let result = fog.reveal(session, map, Role::Player, cells).await;
        assert!(matches!(result, Err(BoardError::DmOnly)));
        let result = fog.reveal_all(session, map, Role::Player).await;
        assert!(matches!(result, Err(BoardError::DmOnly)));
        let result = fog.hide_all(session, map, Role::Player).await;
        assert!(matches!(result, Err(BoardError::DmOnly)));

        // Reads are open to members.
        assert!(fog.state(session, map).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_grid_family_is_rejected() {
        let (fog, session, map) = setup(GridKind::Square).await;
        let result = fog
            .reveal(session, map, Role::Dm, vec![Cell::Hex { q: 0, r: 0 }])
            .await;
        assert!(matches!(result, Err(BoardError::WrongGrid)));
    }

    #[tokio::test]
    async fn test_concurrent_reveals_merge_instead_of_overwriting() {
        // The store suspends between the read and the write, so
        // without per-map serialization the second reveal would
        // clobber the first.
        let store = Arc::new(crate::testutil::YieldingStore::new());
        let session = store.inner.create_session("s", UserId(1)).await;
        let map = store
            .inner
            .create_map(session.id, "m", GridKind::Square, 10, 10)
            .await;
        let fog = FogService::new(store);

        let (a, b) = tokio::join!(
            fog.reveal(
                session.id,
                map.id,
                Role::Dm,
                vec![Cell::Square { col: 0, row: 0 }],
            ),
            fog.reveal(
                session.id,
                map.id,
                Role::Dm,
                vec![Cell::Square { col: 5, row: 5 }],
            ),
        );
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap().len(), 1);

        // Both acknowledged reveals are in the final state.
        let state = fog.state(session.id, map.id).await.unwrap();
        assert!(state.contains(&Cell::Square { col: 0, row: 0 }));
        assert!(state.contains(&Cell::Square { col: 5, row: 5 }));
    }

    #[tokio::test]
    async fn test_map_from_another_session_reads_as_not_found() {
        let store = Arc::new(MemoryStore::new());
        let mine = store.create_session("mine", UserId(1)).await;
        let other = store.create_session("other", UserId(2)).await;
        let foreign_map = store
            .create_map(other.id, "m", GridKind::Square, 3, 3)
            .await;
        let fog = FogService::new(store);

        let result = fog.state(mine.id, foreign_map.id).await;
        assert!(matches!(result, Err(BoardError::MapNotFound(_))));
    }
}
