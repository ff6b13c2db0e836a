//! Mirror of remote entities driven by ENTITY_UPDATE snapshots
//!
//! Each snapshot is treated as the complete set of entities the server wants
//! this client to see. Comparing it with the previous one yields which
//! entities to create, retarget, or destroy. Rendered positions ease toward
//! their targets every frame instead of snapping.

use log::debug;
use shared::EntityState;
use std::collections::HashMap;

/// Share of the remaining distance covered per interpolation step
pub const DEFAULT_INTERPOLATION_FRACTION: f32 = 0.2;

/// Closer than this, an entity snaps onto its target
const SNAP_DISTANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteEntity {
    pub id: u32,
    pub current_x: f32,
    pub current_y: f32,
    pub target_x: f32,
    pub target_y: f32,
}

impl RemoteEntity {
    /// New entities appear directly at their first reported position
    fn new(state: &EntityState) -> Self {
        Self {
            id: state.id,
            current_x: state.x,
            current_y: state.y,
            target_x: state.x,
            target_y: state.y,
        }
    }

    fn retarget(&mut self, state: &EntityState) {
        self.target_x = state.x;
        self.target_y = state.y;
    }

    fn ease(&mut self, fraction: f32) {
        let dx = self.target_x - self.current_x;
        let dy = self.target_y - self.current_y;

        if dx.abs() < SNAP_DISTANCE && dy.abs() < SNAP_DISTANCE {
            self.current_x = self.target_x;
            self.current_y = self.target_y;
            return;
        }

        self.current_x += dx * fraction;
        self.current_y += dy * fraction;
    }

    pub fn position(&self) -> (f32, f32) {
        (self.current_x, self.current_y)
    }

    pub fn is_settled(&self) -> bool {
        self.current_x == self.target_x && self.current_y == self.target_y
    }
}

/// Ids affected by one snapshot, each list sorted ascending
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub created: Vec<u32>,
    pub updated: Vec<u32>,
    pub destroyed: Vec<u32>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.destroyed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Replicator {
    entities: HashMap<u32, RemoteEntity>,
}

impl Replicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles the mirror against one snapshot. The local player's own id
    /// is never mirrored.
    pub fn apply_snapshot(
        &mut self,
        local_id: Option<u32>,
        snapshot: &[EntityState],
    ) -> SnapshotDiff {
        let mut current: HashMap<u32, &EntityState> = HashMap::with_capacity(snapshot.len());
        for state in snapshot {
            if Some(state.id) == local_id {
                continue;
            }
            // A repeated id keeps its last occurrence
            current.insert(state.id, state);
        }

        let mut diff = SnapshotDiff::default();

        for (&id, state) in &current {
            match self.entities.get_mut(&id) {
                Some(entity) => {
                    entity.retarget(state);
                    diff.updated.push(id);
                }
                None => {
                    self.entities.insert(id, RemoteEntity::new(state));
                    diff.created.push(id);
                }
            }
        }

        self.entities.retain(|id, _| {
            let keep = current.contains_key(id);
            if !keep {
                diff.destroyed.push(*id);
            }
            keep
        });

        diff.created.sort_unstable();
        diff.updated.sort_unstable();
        diff.destroyed.sort_unstable();

        if !diff.created.is_empty() || !diff.destroyed.is_empty() {
            debug!(
                "Snapshot: +{:?} -{:?} ({} tracked)",
                diff.created,
                diff.destroyed,
                self.entities.len()
            );
        }

        diff
    }

    /// One easing step for every entity; `fraction` is clamped to [0, 1]
    pub fn interpolate(&mut self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        for entity in self.entities.values_mut() {
            entity.ease(fraction);
        }
    }

    pub fn get(&self, id: u32) -> Option<&RemoteEntity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    /// Tracked ids in ascending order
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn state(id: u32, x: f32, y: f32) -> EntityState {
        EntityState::new(id, x, y)
    }

    #[test]
    fn test_snapshot_sequence_creates_updates_destroys() {
        let mut replicator = Replicator::new();

        let first = replicator.apply_snapshot(Some(99), &[state(1, 0.0, 0.0)]);
        assert_eq!(first.created, vec![1]);
        assert!(first.updated.is_empty());
        assert!(first.destroyed.is_empty());

        let second = replicator.apply_snapshot(Some(99), &[state(1, 1.0, 1.0), state(2, 5.0, 5.0)]);
        assert_eq!(second.created, vec![2]);
        assert_eq!(second.updated, vec![1]);
        assert!(second.destroyed.is_empty());

        let third = replicator.apply_snapshot(Some(99), &[state(2, 6.0, 6.0)]);
        assert!(third.created.is_empty());
        assert_eq!(third.updated, vec![2]);
        assert_eq!(third.destroyed, vec![1]);

        assert_eq!(replicator.ids(), vec![2]);
    }

    #[test]
    fn test_local_player_is_never_mirrored() {
        let mut replicator = Replicator::new();
        let diff = replicator.apply_snapshot(Some(1), &[state(1, 0.0, 0.0), state(2, 0.0, 0.0)]);

        assert_eq!(diff.created, vec![2]);
        assert!(!replicator.contains(1));
    }

    #[test]
    fn test_local_id_learned_late_destroys_its_mirror() {
        let mut replicator = Replicator::new();
        replicator.apply_snapshot(None, &[state(1, 0.0, 0.0), state(2, 0.0, 0.0)]);

        let diff = replicator.apply_snapshot(Some(1), &[state(1, 0.0, 0.0), state(2, 0.0, 0.0)]);
        assert_eq!(diff.destroyed, vec![1]);
        assert_eq!(replicator.ids(), vec![2]);
    }

    #[test]
    fn test_empty_snapshot_destroys_everything() {
        let mut replicator = Replicator::new();
        replicator.apply_snapshot(None, &[state(3, 0.0, 0.0), state(1, 0.0, 0.0)]);

        let diff = replicator.apply_snapshot(None, &[]);
        assert_eq!(diff.destroyed, vec![1, 3]);
        assert!(replicator.is_empty());
    }

    #[test]
    fn test_identical_snapshot_only_updates() {
        let mut replicator = Replicator::new();
        let snapshot = [state(1, 2.0, 3.0), state(2, 4.0, 5.0)];
        replicator.apply_snapshot(None, &snapshot);

        let diff = replicator.apply_snapshot(None, &snapshot);
        assert!(diff.created.is_empty());
        assert!(diff.destroyed.is_empty());
        assert_eq!(diff.updated, vec![1, 2]);
    }

    #[test]
    fn test_duplicate_id_keeps_last_position() {
        let mut replicator = Replicator::new();
        let diff = replicator.apply_snapshot(None, &[state(1, 0.0, 0.0), state(1, 9.0, 9.0)]);

        assert_eq!(diff.created, vec![1]);
        let entity = replicator.get(1).unwrap();
        assert_eq!(entity.position(), (9.0, 9.0));
    }

    #[test]
    fn test_interpolation_eases_toward_target() {
        let mut replicator = Replicator::new();
        replicator.apply_snapshot(None, &[state(1, 0.0, 0.0)]);
        replicator.apply_snapshot(None, &[state(1, 10.0, -10.0)]);

        // Retargeting does not move the rendered position
        assert_eq!(replicator.get(1).unwrap().position(), (0.0, 0.0));

        replicator.interpolate(DEFAULT_INTERPOLATION_FRACTION);
        let entity = replicator.get(1).unwrap();
        assert_approx_eq!(entity.current_x, 2.0);
        assert_approx_eq!(entity.current_y, -2.0);

        replicator.interpolate(DEFAULT_INTERPOLATION_FRACTION);
        let entity = replicator.get(1).unwrap();
        assert_approx_eq!(entity.current_x, 3.6);
        assert_approx_eq!(entity.current_y, -3.6);
    }

    #[test]
    fn test_interpolation_converges() {
        let mut replicator = Replicator::new();
        replicator.apply_snapshot(None, &[state(1, 0.0, 0.0)]);
        replicator.apply_snapshot(None, &[state(1, 100.0, 50.0)]);

        for _ in 0..200 {
            replicator.interpolate(DEFAULT_INTERPOLATION_FRACTION);
        }
        let entity = replicator.get(1).unwrap();
        assert!(entity.is_settled());
        assert_eq!(entity.position(), (100.0, 50.0));
    }

    #[test]
    fn test_interpolation_fraction_is_clamped() {
        let mut replicator = Replicator::new();
        replicator.apply_snapshot(None, &[state(1, 0.0, 0.0)]);
        replicator.apply_snapshot(None, &[state(1, 10.0, 10.0)]);

        replicator.interpolate(5.0);
        assert_eq!(replicator.get(1).unwrap().position(), (10.0, 10.0));

        replicator.apply_snapshot(None, &[state(1, 20.0, 20.0)]);
        replicator.interpolate(-1.0);
        replicator.interpolate(f32::NAN);
        assert_eq!(replicator.get(1).unwrap().position(), (10.0, 10.0));
    }
}
