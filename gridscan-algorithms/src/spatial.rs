//! Spatial indexing for efficient neighbor lookup.

use gridscan_core::GeoPoint;
use std::collections::HashMap;

/// Cells kept allocated across a same-size [`SpatialGrid::reset`].
const MAX_RETAINED_CELLS: usize = 4096;

/// Bucket grid for 2D radius queries over point indices.
///
/// Cells are `cell_size` wide on both axes, so with `cell_size >= radius`
/// the 3x3 neighborhood of a point's cell covers its whole radius.
#[derive(Debug, Default)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    /// Create a new spatial grid. `cell_size` must be positive.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    /// Cell size in degrees.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Clear all data and set a new cell size.
    ///
    /// Buckets stay allocated only when the cell size is unchanged and the
    /// map is small; otherwise every cell is dropped, since keys from one
    /// region are useless for the next.
    pub fn reset(&mut self, cell_size: f64) {
        if cell_size.to_bits() != self.cell_size.to_bits() || self.cells.len() > MAX_RETAINED_CELLS
        {
            self.cells.clear();
        } else {
            for bucket in self.cells.values_mut() {
                bucket.clear();
            }
        }
        self.cell_size = cell_size;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_of(&self, p: &GeoPoint) -> (i64, i64) {
        (
            (p.long / self.cell_size).floor() as i64,
            (p.lat / self.cell_size).floor() as i64,
        )
    }

    /// Insert a point index at the given coordinates.
    pub fn insert(&mut self, p: &GeoPoint, index: usize) {
        let cell = self.cell_of(p);
        self.cells.entry(cell).or_default().push(index);
    }

    /// Append to `out` every index stored in the 3x3 neighborhood around `p`.
    ///
    /// Candidates are unfiltered and unordered across cells.
    pub fn query_neighborhood_into(&self, p: &GeoPoint, out: &mut Vec<usize>) {
        let (cx, cy) = self.cell_of(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(values) = self.cells.get(&(cx + dx, cy + dy)) {
                    out.extend_from_slice(values);
                }
            }
        }
    }
}
