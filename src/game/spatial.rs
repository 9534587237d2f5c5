//! Uniform spatial hash grid for broad-phase collision lookup
//!
//! Divides the bounded map into fixed-size cells. Each entity is registered in
//! every cell its bounding square touches, and a reverse index remembers those
//! cells so removal and update cost O(cells occupied) instead of a grid scan.
//!
//! Queries over-approximate: results may include the querying entity itself and
//! entities whose disks do not actually overlap. Callers always run a
//! narrow-phase distance check.
//!
//! Cell coordinates are clamped to the grid, so anything outside the map lands
//! in the edge cells.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::hash::Hash;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Cells recorded for one entity; typical entities touch 1-4 cells
type CellList = SmallVec<[CellKey; 4]>;

/// Initial capacity for the cell map (default map is 10x10)
const GRID_INITIAL_CAPACITY: usize = 128;

/// Initial capacity for the reverse index
const ENTITY_INITIAL_CAPACITY: usize = 512;

/// Uniform grid over a bounded map, keyed by any copyable id
#[derive(Debug, Clone)]
pub struct SpatialIndex<K> {
    /// Cell size in world units
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    /// Number of cell columns
    grid_width: i32,
    /// Number of cell rows
    grid_height: i32,
    /// Cell -> ids overlapping it; empty cells are pruned
    cells: FxHashMap<CellKey, FxHashSet<K>>,
    /// Id -> cells it was registered under at last insertion
    entity_cells: FxHashMap<K, CellList>,
}

impl<K> SpatialIndex<K>
where
    K: Copy + Eq + Hash,
{
    /// Create an index covering a `map_width` x `map_height` map.
    ///
    /// The grid has `ceil(map / cell_size)` cells per axis (at least one).
    pub fn new(map_width: f32, map_height: f32, cell_size: f32) -> Self {
        let grid_width = ((map_width / cell_size).ceil() as i32).max(1);
        let grid_height = ((map_height / cell_size).ceil() as i32).max(1);

        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            grid_width,
            grid_height,
            cells: FxHashMap::with_capacity_and_hasher(GRID_INITIAL_CAPACITY, Default::default()),
            entity_cells: FxHashMap::with_capacity_and_hasher(
                ENTITY_INITIAL_CAPACITY,
                Default::default(),
            ),
        }
    }

    /// Grid dimensions in cells (columns, rows)
    pub fn grid_dimensions(&self) -> (i32, i32) {
        (self.grid_width, self.grid_height)
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert a world position to its clamped cell
    #[inline]
    pub fn cell_for(&self, x: f32, y: f32) -> CellKey {
        let cx = (x * self.inv_cell_size).floor() as i32;
        let cy = (y * self.inv_cell_size).floor() as i32;
        (
            cx.clamp(0, self.grid_width - 1),
            cy.clamp(0, self.grid_height - 1),
        )
    }

    /// Inclusive cell range covered by the square [x-r, x+r] x [y-r, y+r]
    #[inline]
    fn cell_range(&self, x: f32, y: f32, radius: f32) -> (CellKey, CellKey) {
        (
            self.cell_for(x - radius, y - radius),
            self.cell_for(x + radius, y + radius),
        )
    }

    /// Insert an entity, fully replacing any previous registration
    pub fn insert_or_update(&mut self, id: K, x: f32, y: f32, radius: f32) {
        self.remove(id);

        let ((min_x, min_y), (max_x, max_y)) = self.cell_range(x, y, radius);
        let mut occupied = CellList::new();

        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                let key = (cx, cy);
                self.cells.entry(key).or_default().insert(id);
                occupied.push(key);
            }
        }

        self.entity_cells.insert(id, occupied);
    }

    /// Remove an entity from every cell it occupies.
    /// Returns false if the id was not indexed.
    pub fn remove(&mut self, id: K) -> bool {
        let Some(occupied) = self.entity_cells.remove(&id) else {
            return false;
        };

        for key in occupied {
            if let Some(members) = self.cells.get_mut(&key) {
                members.remove(&id);
                if members.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
        true
    }

    /// Broad-phase query: every id registered in a cell touched by the
    /// square [x-r, x+r] x [y-r, y+r]. Deduplicated; may include false positives.
    pub fn query(&self, x: f32, y: f32, radius: f32) -> FxHashSet<K> {
        let mut found = FxHashSet::default();
        self.query_into(x, y, radius, &mut found);
        found
    }

    /// Like [`query`](Self::query) but appends into a caller-owned buffer
    pub fn query_into(&self, x: f32, y: f32, radius: f32, out: &mut FxHashSet<K>) {
        let ((min_x, min_y), (max_x, max_y)) = self.cell_range(x, y, radius);

        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                if let Some(members) = self.cells.get(&(cx, cy)) {
                    out.extend(members.iter().copied());
                }
            }
        }
    }

    /// Whether the id is currently indexed
    #[inline]
    pub fn contains(&self, id: K) -> bool {
        self.entity_cells.contains_key(&id)
    }

    /// Cells the id was registered under, if indexed
    pub fn cells_of(&self, id: K) -> Option<&[CellKey]> {
        self.entity_cells.get(&id).map(|cells| cells.as_slice())
    }

    /// Ids registered under one cell
    pub fn members(&self, cell: CellKey) -> Option<&FxHashSet<K>> {
        self.cells.get(&cell)
    }

    /// Number of indexed entities
    #[inline]
    pub fn len(&self) -> usize {
        self.entity_cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entity_cells.is_empty()
    }

    /// Drop all state
    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_cells.clear();
    }

    /// Iterate every indexed id
    pub fn ids(&self) -> impl Iterator<Item = K> + '_ {
        self.entity_cells.keys().copied()
    }

    /// Check forward and reverse maps agree exactly (used by tests and debug checks)
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.cells.iter().all(|(key, members)| {
            !members.is_empty()
                && members.iter().all(|id| {
                    self.entity_cells
                        .get(id)
                        .is_some_and(|cells| cells.contains(key))
                })
        });
        let reverse_ok = self.entity_cells.iter().all(|(id, cells)| {
            cells.iter().all(|key| {
                self.cells
                    .get(key)
                    .is_some_and(|members| members.contains(id))
            })
        });
        forward_ok && reverse_ok
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> SpatialIndexStats {
        let occupied_cells = self.cells.len();
        let registrations: usize = self.cells.values().map(|c| c.len()).sum();
        let max_per_cell = self.cells.values().map(|c| c.len()).max().unwrap_or(0);

        SpatialIndexStats {
            entities: self.entity_cells.len(),
            occupied_cells,
            registrations,
            max_per_cell,
        }
    }
}

/// Statistics about the spatial index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialIndexStats {
    pub entities: usize,
    pub occupied_cells: usize,
    /// Sum of per-cell membership counts (entities spanning cells count once per cell)
    pub registrations: usize,
    pub max_per_cell: usize,
}
