//! Spatial partitioning for target lookups.
//!
//! Provides O(1) cell lookup and O(k) radius queries where k is the number
//! of targets in nearby cells, rather than O(n) for brute force.

use std::collections::HashMap;

use crate::components::{Position, TargetId};

/// Grid-based spatial index of targets.
///
/// Divides the world into cells and tracks which targets are in each cell.
#[derive(Debug, Clone)]
pub struct TargetGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    /// Map from cell coordinates to the targets in that cell.
    cells: HashMap<(i32, i32), Vec<TargetEntry>>,
    /// Reverse lookup: target to cell.
    target_cells: HashMap<TargetId, (i32, i32)>,
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEntry {
    pub id: TargetId,
    pub x: f32,
    pub y: f32,
    /// Inactive targets stay indexed but are never reported.
    pub active: bool,
}

impl TargetEntry {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

impl Default for TargetGrid {
    fn default() -> Self {
        Self::new(8.0)
    }
}

impl TargetGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            target_cells: HashMap::new(),
        }
    }

    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Insert or move a target. Keeps its active flag when it already exists.
    pub fn upsert(&mut self, id: TargetId, x: f32, y: f32) {
        let active = self.get(id).map(|e| e.active).unwrap_or(true);
        self.remove(id);
        let cell = self.world_to_cell(x, y);
        self.cells.entry(cell).or_default().push(TargetEntry { id, x, y, active });
        self.target_cells.insert(id, cell);
    }

    pub fn remove(&mut self, id: TargetId) -> bool {
        let Some(cell) = self.target_cells.remove(&id) else {
            return false;
        };
        if let Some(entries) = self.cells.get_mut(&cell) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                self.cells.remove(&cell);
            }
        }
        true
    }

    pub fn set_active(&mut self, id: TargetId, active: bool) -> bool {
        let Some(cell) = self.target_cells.get(&id) else {
            return false;
        };
        match self.cells.get_mut(cell).and_then(|entries| entries.iter_mut().find(|e| e.id == id)) {
            Some(entry) => {
                entry.active = active;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: TargetId) -> Option<&TargetEntry> {
        let cell = self.target_cells.get(&id)?;
        self.cells.get(cell)?.iter().find(|e| e.id == id)
    }

    /// All active targets within `radius` of a point, closest first.
    /// Equal distances are ordered by target id.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<TargetEntry> {
        let radius_sq = radius * radius;
        let cells_to_check = (radius / self.cell_size).ceil() as i32 + 1;
        let center_cell = self.world_to_cell(x, y);

        let mut results = Vec::new();

        for dx in -cells_to_check..=cells_to_check {
            for dy in -cells_to_check..=cells_to_check {
                let cell = (center_cell.0 + dx, center_cell.1 + dy);
                if let Some(entries) = self.cells.get(&cell) {
                    for entry in entries.iter().filter(|e| e.active) {
                        let dist_sq = (entry.x - x).powi(2) + (entry.y - y).powi(2);
                        if dist_sq <= radius_sq {
                            results.push(*entry);
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            let dist_a = (a.x - x).powi(2) + (a.y - y).powi(2);
            let dist_b = (b.x - x).powi(2) + (b.y - y).powi(2);
            dist_a
                .partial_cmp(&dist_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });

        results
    }

    /// Total indexed targets, active or not.
    pub fn total_count(&self) -> usize {
        self.target_cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_insert_query() {
        let mut grid = TargetGrid::new(10.0);

        grid.upsert(TargetId(1), 5.0, 5.0);
        grid.upsert(TargetId(2), 15.0, 5.0);
        grid.upsert(TargetId(3), 100.0, 100.0);

        assert_eq!(grid.query_radius(5.0, 5.0, 15.0).len(), 2);
        assert_eq!(grid.query_radius(5.0, 5.0, 5.0).len(), 1);
        assert_eq!(grid.query_radius(100.0, 100.0, 10.0).len(), 1);
    }

    #[test]
    fn test_query_sorted_by_distance() {
        let mut grid = TargetGrid::new(10.0);
        grid.upsert(TargetId(1), 30.0, 0.0);
        grid.upsert(TargetId(2), 20.0, 0.0);

        let hits = grid.query_radius(0.0, 0.0, 50.0);
        assert_eq!(hits[0].id, TargetId(2));
        assert_eq!(hits[1].id, TargetId(1));
    }

    #[test]
    fn test_upsert_moves_between_cells() {
        let mut grid = TargetGrid::new(10.0);
        grid.upsert(TargetId(7), 1.0, 1.0);
        grid.upsert(TargetId(7), 55.0, 1.0);

        assert_eq!(grid.total_count(), 1);
        assert!(grid.query_radius(1.0, 1.0, 5.0).is_empty());
        assert_eq!(grid.get(TargetId(7)).map(|e| e.x), Some(55.0));
    }

    #[test]
    fn test_inactive_targets_are_not_reported() {
        let mut grid = TargetGrid::new(10.0);
        grid.upsert(TargetId(1), 0.0, 0.0);
        assert!(grid.set_active(TargetId(1), false));
        assert!(grid.query_radius(0.0, 0.0, 5.0).is_empty());

        // Moving keeps the flag.
        grid.upsert(TargetId(1), 1.0, 0.0);
        assert!(grid.query_radius(0.0, 0.0, 5.0).is_empty());

        grid.set_active(TargetId(1), true);
        assert_eq!(grid.query_radius(0.0, 0.0, 5.0).len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut grid = TargetGrid::new(10.0);
        grid.upsert(TargetId(1), 0.0, 0.0);
        assert!(grid.remove(TargetId(1)));
        assert!(!grid.remove(TargetId(1)));
        assert!(grid.get(TargetId(1)).is_none());
    }
}
