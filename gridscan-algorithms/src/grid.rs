//! Grid partitioning with eps halos.
//!
//! The bounding box is split into `N x N` equal cells. Each cell's partition
//! receives every point inside the cell's bound grown by `eps` on all four
//! sides, so DBSCAN neighborhoods of the cell's own points can be computed
//! without looking at any other partition. Points in a halo overlap are
//! copied into every partition that covers them.

use gridscan_core::{BoundingBox, CellIndex, Error, GeoPoint, LabeledPoint, Result};

/// One grid cell and the point copies it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Cell coordinates.
    pub cell: CellIndex,
    /// Cell bound grown by the halo.
    pub bounds: BoundingBox,
    /// Point copies in input order.
    pub points: Vec<LabeledPoint>,
}

impl Partition {
    /// Number of point copies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the partition holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Fixed `N x N` array of partitions.
#[derive(Debug, Clone)]
pub struct Grid {
    size: usize,
    bounds: BoundingBox,
    /// Row-major by latitude: cell `(i, j)` is at `j * size + i`.
    cells: Vec<Partition>,
    outside: usize,
}

impl Grid {
    /// Grid dimension `N`.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Unexpanded grid extent.
    #[must_use]
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Partition of cell `(i, j)`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<&Partition> {
        if i < self.size && j < self.size {
            self.cells.get(CellIndex::new(i, j).linear(self.size))
        } else {
            None
        }
    }

    /// Partitions in enqueue order (`j` outer, `i` inner).
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.cells.iter()
    }

    /// Consumes the grid, yielding partitions in enqueue order.
    #[must_use]
    pub fn into_partitions(self) -> Vec<Partition> {
        self.cells
    }

    /// Sum of partition lengths, halo copies included.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.cells.iter().map(Partition::len).sum()
    }

    /// Input points that fell in no partition (outside the halo-expanded
    /// grid bounds).
    #[must_use]
    pub fn outside(&self) -> usize {
        self.outside
    }
}

/// Splits a point set into an `N x N` grid of halo-expanded partitions.
#[derive(Debug, Clone)]
pub struct GridPartitioner {
    size: usize,
    epsilon: f64,
}

impl GridPartitioner {
    /// Creates a partitioner for an `size x size` grid with halo `epsilon`.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if `size` is zero or `epsilon` is
    /// negative or not finite.
    pub fn new(size: usize, epsilon: f64) -> Result<Self> {
        if size == 0 {
            return Err(Error::ConfigError("grid size must be at least 1".into()));
        }
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err(Error::ConfigError(format!("invalid halo epsilon: {epsilon}")));
        }
        Ok(Self { size, epsilon })
    }

    /// Grid dimension `N`.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Halo-expanded bound of cell `(i, j)` within `bounds`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn cell_bounds(&self, bounds: &BoundingBox, cell: CellIndex) -> BoundingBox {
        let n = self.size as f64;
        let incx = bounds.width() / n;
        let incy = bounds.height() / n;
        let (i, j) = (cell.i as f64, cell.j as f64);
        BoundingBox {
            min: GeoPoint::new(
                bounds.min.lat + j * incy - self.epsilon,
                bounds.min.long + i * incx - self.epsilon,
            ),
            max: GeoPoint::new(
                bounds.min.lat + (j + 1.0) * incy + self.epsilon,
                bounds.min.long + (i + 1.0) * incx + self.epsilon,
            ),
        }
    }

    /// Builds the grid.
    ///
    /// Each point is tested only against the cells whose halo-expanded bound
    /// can reach it, then appended in input order to every matching cell.
    /// The result is the same as testing every point against every cell.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBounds`] if `bounds` is empty on either axis or
    /// not finite.
    pub fn partition(&self, points: &[LabeledPoint], bounds: &BoundingBox) -> Result<Grid> {
        let width = bounds.width();
        let height = bounds.height();
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(Error::InvalidBounds(format!(
                "grid bounds must have positive extent, got {width} x {height}"
            )));
        }

        let n = self.size;
        let mut cells: Vec<Partition> = (0..n * n)
            .map(|k| {
                let cell = CellIndex::new(k % n, k / n);
                Partition {
                    cell,
                    bounds: self.cell_bounds(bounds, cell),
                    points: Vec::new(),
                }
            })
            .collect();

        let mut outside = 0usize;
        for pt in points {
            let (i_lo, i_hi) = self.candidate_range(pt.long() - bounds.min.long, width);
            let (j_lo, j_hi) = self.candidate_range(pt.lat() - bounds.min.lat, height);

            let mut placed = false;
            for j in j_lo..=j_hi {
                for i in i_lo..=i_hi {
                    let partition = &mut cells[j * n + i];
                    if partition.bounds.contains(&pt.point) {
                        partition.points.push(*pt);
                        placed = true;
                    }
                }
            }
            if !placed {
                outside += 1;
            }
        }

        Ok(Grid {
            size: n,
            bounds: *bounds,
            cells,
            outside,
        })
    }

    /// Inclusive range of cell indices along one axis whose expanded interval
    /// may contain `offset` (distance from the grid origin on that axis).
    ///
    /// Widened by one cell each way so rounding can only add candidates.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn candidate_range(&self, offset: f64, extent: f64) -> (usize, usize) {
        let n = self.size as f64;
        let inc = extent / n;
        let lo = ((offset - self.epsilon) / inc).floor() - 1.0;
        let hi = ((offset + self.epsilon) / inc).floor() + 1.0;
        let clamp = |v: f64| {
            if v.is_nan() {
                0.0
            } else {
                v.clamp(0.0, n - 1.0)
            }
        };
        (clamp(lo) as usize, clamp(hi) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_bounds() -> BoundingBox {
        BoundingBox::new(GeoPoint::new(0.0, 0.0), GeoPoint::new(4.0, 4.0)).unwrap()
    }

    fn exhaustive(
        partitioner: &GridPartitioner,
        points: &[LabeledPoint],
        bounds: &BoundingBox,
    ) -> Vec<Vec<u64>> {
        let n = partitioner.size();
        let mut out = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let cb = partitioner.cell_bounds(bounds, CellIndex::new(i, j));
                out.push(
                    points
                        .iter()
                        .filter(|p| cb.contains(&p.point))
                        .map(|p| p.id)
                        .collect(),
                );
            }
        }
        out
    }

    #[test]
    fn test_cell_bounds_include_halo() {
        let partitioner = GridPartitioner::new(4, 0.1).unwrap();
        let cb = partitioner.cell_bounds(&unit_bounds(), CellIndex::new(1, 2));
        assert_relative_eq!(cb.min.long, 0.9);
        assert_relative_eq!(cb.max.long, 2.1);
        assert_relative_eq!(cb.min.lat, 1.9);
        assert_relative_eq!(cb.max.lat, 3.1);
    }

    #[test]
    fn test_interior_point_in_single_cell() {
        let partitioner = GridPartitioner::new(4, 0.1).unwrap();
        let points = vec![LabeledPoint::new(1, 2.5, 1.5)];
        let grid = partitioner.partition(&points, &unit_bounds()).unwrap();
        assert_eq!(grid.total_len(), 1);
        assert_eq!(grid.get(1, 2).unwrap().points[0].id, 1);
        assert_eq!(grid.outside(), 0);
    }

    #[test]
    fn test_halo_point_duplicated() {
        let partitioner = GridPartitioner::new(4, 0.1).unwrap();
        // Near the corner shared by cells (0,0), (1,0), (0,1), (1,1).
        let points = vec![LabeledPoint::new(1, 1.05, 0.95)];
        let grid = partitioner.partition(&points, &unit_bounds()).unwrap();
        assert_eq!(grid.total_len(), 4);
        for (i, j) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(grid.get(i, j).unwrap().len(), 1, "cell ({i}, {j})");
        }
    }

    #[test]
    fn test_matches_exhaustive_scan() {
        let bounds = BoundingBox::new(GeoPoint::new(40.7, -74.0), GeoPoint::new(40.8, -73.93))
            .unwrap();
        let partitioner = GridPartitioner::new(5, 0.0003).unwrap();

        let mut seed: u32 = 7;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345) & 0x7fff_ffff;
            f64::from(seed) / f64::from(0x7fff_ffff_u32)
        };
        let mut points: Vec<_> = (1..=2000)
            .map(|id| LabeledPoint::new(id, 40.69 + next() * 0.12, -74.01 + next() * 0.09))
            .collect();
        // Exactly on cell boundaries and on the grid edge.
        points.push(LabeledPoint::new(2001, 40.72, -73.986));
        points.push(LabeledPoint::new(2002, 40.8, -73.93));

        let grid = partitioner.partition(&points, &bounds).unwrap();
        let expected = exhaustive(&partitioner, &points, &bounds);
        let actual: Vec<Vec<u64>> = grid
            .partitions()
            .map(|p| p.points.iter().map(|pt| pt.id).collect())
            .collect();
        assert_eq!(actual, expected);

        let in_none = points
            .iter()
            .filter(|p| expected.iter().all(|ids| !ids.contains(&p.id)))
            .count();
        assert_eq!(grid.outside(), in_none);
        assert!(grid.total_len() + grid.outside() >= points.len());
    }

    #[test]
    fn test_no_overlap_means_equal_total() {
        let partitioner = GridPartitioner::new(2, 0.1).unwrap();
        let points = vec![
            LabeledPoint::new(1, 0.5, 0.5),
            LabeledPoint::new(2, 0.5, 3.5),
            LabeledPoint::new(3, 3.5, 0.5),
            LabeledPoint::new(4, 3.5, 3.5),
        ];
        let grid = partitioner.partition(&points, &unit_bounds()).unwrap();
        assert_eq!(grid.total_len(), points.len());
    }

    #[test]
    fn test_partitions_keep_input_order() {
        let partitioner = GridPartitioner::new(1, 0.0).unwrap();
        let points: Vec<_> = (1..=5u32)
            .map(|id| LabeledPoint::new(u64::from(id), 3.0 - f64::from(id) * 0.5, 1.0))
            .collect();
        let grid = partitioner.partition(&points, &unit_bounds()).unwrap();
        let ids: Vec<u64> = grid.get(0, 0).unwrap().points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(matches!(GridPartitioner::new(0, 0.1), Err(Error::ConfigError(_))));
        assert!(matches!(
            GridPartitioner::new(2, f64::NAN),
            Err(Error::ConfigError(_))
        ));

        let flat = BoundingBox::new(GeoPoint::new(1.0, 0.0), GeoPoint::new(1.0, 4.0)).unwrap();
        let partitioner = GridPartitioner::new(2, 0.1).unwrap();
        assert!(matches!(
            partitioner.partition(&[], &flat),
            Err(Error::InvalidBounds(_))
        ));
    }
}
