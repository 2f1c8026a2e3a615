//! Bounding boxes and grid cell coordinates.

use crate::{Error, GeoPoint, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in `(lat, long)` space.
///
/// `min` is the lower-left corner (smallest lat and long), `max` the
/// upper-right one.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// Lower-left corner.
    pub min: GeoPoint,
    /// Upper-right corner.
    pub max: GeoPoint,
}

impl BoundingBox {
    /// Creates a bounding box, rejecting inverted or non-finite corners.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBounds`] if a coordinate is not finite or if
    /// `min` is greater than `max` on either axis.
    pub fn new(min: GeoPoint, max: GeoPoint) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::InvalidBounds(format!(
                "non-finite corner in ({min:?}, {max:?})"
            )));
        }
        if min.lat > max.lat || min.long > max.long {
            return Err(Error::InvalidBounds(format!(
                "min ({}, {}) exceeds max ({}, {})",
                min.lat, min.long, max.lat, max.long
            )));
        }
        Ok(Self { min, max })
    }

    /// Tight bounds of a point sequence, `None` if it is empty.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GeoPoint>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let bounds = iter.fold(Self::point(first), |acc, p| acc.union(&Self::point(*p)));
        Some(bounds)
    }

    /// Degenerate box around a single point.
    #[must_use]
    pub fn point(p: GeoPoint) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box covering both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: GeoPoint::new(self.min.lat.min(other.min.lat), self.min.long.min(other.min.long)),
            max: GeoPoint::new(self.max.lat.max(other.max.lat), self.max.long.max(other.max.long)),
        }
    }

    /// Returns this box grown by `margin` on all four sides.
    #[must_use]
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min: GeoPoint::new(self.min.lat - margin, self.min.long - margin),
            max: GeoPoint::new(self.max.lat + margin, self.max.long + margin),
        }
    }

    /// Half-open containment test: `min <= v < max` on both axes.
    #[inline]
    #[must_use]
    pub fn contains(&self, p: &GeoPoint) -> bool {
        p.long >= self.min.long
            && p.long < self.max.long
            && p.lat >= self.min.lat
            && p.lat < self.max.lat
    }

    /// Longitude extent.
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.long - self.min.long
    }

    /// Latitude extent.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.lat - self.min.lat
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NW:({:.6} , {:.6}) SE:({:.6} , {:.6})",
            self.min.long, self.min.lat, self.max.long, self.max.lat
        )
    }
}

/// Integer coordinates of a grid cell.
///
/// `i` runs along the longitude axis, `j` along the latitude axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellIndex {
    pub i: usize,
    pub j: usize,
}

impl CellIndex {
    #[inline]
    #[must_use]
    pub fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }

    /// Row-major position in an `n x n` grid, rows along latitude.
    ///
    /// This is also the order in which cells are enqueued.
    #[inline]
    #[must_use]
    pub fn linear(&self, n: usize) -> usize {
        self.j * n + self.i
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_rejects_inverted() {
        let err = BoundingBox::new(GeoPoint::new(41.0, -74.0), GeoPoint::new(40.0, -73.0));
        assert!(matches!(err, Err(Error::InvalidBounds(_))));

        let err = BoundingBox::new(GeoPoint::new(f64::NAN, -74.0), GeoPoint::new(40.0, -73.0));
        assert!(matches!(err, Err(Error::InvalidBounds(_))));
    }

    #[test]
    fn test_from_points_is_tight() {
        let pts = [
            GeoPoint::new(40.70, -73.99),
            GeoPoint::new(40.80, -74.00),
            GeoPoint::new(40.75, -73.93),
        ];
        let b = BoundingBox::from_points(&pts).unwrap();
        assert_relative_eq!(b.min.lat, 40.70);
        assert_relative_eq!(b.min.long, -74.00);
        assert_relative_eq!(b.max.lat, 40.80);
        assert_relative_eq!(b.max.long, -73.93);
        assert!(BoundingBox::from_points(Vec::<GeoPoint>::new().iter()).is_none());
    }

    #[test]
    fn test_contains_is_half_open() {
        let b = BoundingBox::new(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)).unwrap();
        assert!(b.contains(&GeoPoint::new(0.0, 0.0)));
        assert!(b.contains(&GeoPoint::new(0.5, 0.999)));
        assert!(!b.contains(&GeoPoint::new(1.0, 0.5)));
        assert!(!b.contains(&GeoPoint::new(0.5, 1.0)));
    }

    #[test]
    fn test_expand_grows_every_side() {
        let b = BoundingBox::new(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 2.0)).unwrap();
        let e = b.expand(0.5);
        assert_relative_eq!(e.min.lat, -0.5);
        assert_relative_eq!(e.min.long, -0.5);
        assert_relative_eq!(e.max.lat, 1.5);
        assert_relative_eq!(e.max.long, 2.5);
        assert_relative_eq!(e.width(), 3.0);
        assert_relative_eq!(e.height(), 2.0);
    }

    #[test]
    fn test_cell_linear_order() {
        assert_eq!(CellIndex::new(0, 0).linear(4), 0);
        assert_eq!(CellIndex::new(3, 0).linear(4), 3);
        assert_eq!(CellIndex::new(0, 1).linear(4), 4);
        assert_eq!(CellIndex::new(3, 3).linear(4), 15);
    }
}
