//! Default vision sensor backed by a target grid.

use std::any::Any;

use crate::components::{Position, TargetId, TargetRef};
use crate::ports::{FieldOfView, Sensor};
use crate::spatial::TargetGrid;

/// Registry of external targets that the embedder keeps up to date.
///
/// Targets are moved with [`TargetRoster::upsert`], hidden with
/// [`TargetRoster::set_active`] and destroyed with [`TargetRoster::remove`].
#[derive(Debug, Clone, Default)]
pub struct TargetRoster {
    grid: TargetGrid,
}

impl TargetRoster {
    pub fn new(cell_size: f32) -> Self {
        Self {
            grid: TargetGrid::new(cell_size),
        }
    }

    pub fn upsert(&mut self, id: TargetId, position: Position) {
        self.grid.upsert(id, position.x, position.y);
    }

    pub fn set_active(&mut self, id: TargetId, active: bool) -> bool {
        self.grid.set_active(id, active)
    }

    pub fn remove(&mut self, id: TargetId) -> bool {
        self.grid.remove(id)
    }

    pub fn len(&self) -> usize {
        self.grid.total_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sensor for TargetRoster {
    fn try_get_closest_target(&self, origin: Position, range: f32, fov: FieldOfView) -> Option<TargetRef> {
        self.grid
            .query_radius(origin.x, origin.y, range)
            .into_iter()
            .find(|entry| fov.contains(origin, entry.position()))
            .map(|entry| TargetRef {
                id: entry.id,
                position: entry.position(),
            })
    }

    fn target_position(&self, target: TargetId) -> Option<Position> {
        self.grid
            .get(target)
            .filter(|entry| entry.active)
            .map(|entry| entry.position())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
