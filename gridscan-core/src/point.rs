//! Point and label types for geospatial clustering.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A geographic coordinate in decimal degrees.
///
/// Distances between points are planar Euclidean over `(lat, long)`, not
/// great-circle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub long: f64,
}

impl GeoPoint {
    /// Creates a new point.
    #[inline]
    #[must_use]
    pub fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }

    /// Planar Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let dlat = self.lat - other.lat;
        let dlong = self.long - other.long;
        (dlat * dlat + dlong * dlong).sqrt()
    }

    /// Returns true if both coordinates are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.long.is_finite()
    }
}

/// Clustering state of a point.
///
/// `0` is unclassified, `-1` is noise and any positive value is a cluster id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Label(pub i64);

impl Label {
    /// Not yet visited by the clustering scan.
    pub const UNCLASSIFIED: Self = Self(0);
    /// Too sparse to belong to any cluster (so far).
    pub const NOISE: Self = Self(-1);

    /// Creates a cluster label.
    #[inline]
    #[must_use]
    pub fn cluster(id: i64) -> Self {
        debug_assert!(id > 0, "cluster ids are positive");
        Self(id)
    }

    /// Returns the raw label value.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn is_unclassified(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub fn is_noise(&self) -> bool {
        self.0 == -1
    }

    /// Returns the cluster id if this point belongs to a cluster.
    #[inline]
    #[must_use]
    pub fn cluster_id(&self) -> Option<i64> {
        (self.0 > 0).then_some(self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point with a stable identifier and a mutable clustering label.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabeledPoint {
    /// Coordinates.
    pub point: GeoPoint,
    /// Load-time identifier, unique across the input set.
    pub id: u64,
    /// Current label.
    pub label: Label,
}

impl LabeledPoint {
    /// Creates an unclassified point.
    #[inline]
    #[must_use]
    pub fn new(id: u64, lat: f64, long: f64) -> Self {
        Self {
            point: GeoPoint::new(lat, long),
            id,
            label: Label::UNCLASSIFIED,
        }
    }

    #[inline]
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.point.lat
    }

    #[inline]
    #[must_use]
    pub fn long(&self) -> f64 {
        self.point.long
    }
}
