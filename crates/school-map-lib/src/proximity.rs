//! Proximity pairing of markers that would otherwise be drawn on top of each other
//!
//! The pass is greedy and first-match-wins: for each unpaired marker `i` (in input order) the
//! first later unpaired marker `j` within the threshold becomes its partner, even if a closer
//! candidate appears further down the list. That behavior is deliberate and pinned by tests.
//!
//! # Complexity
//!
//! O(n²) Haversine evaluations. Fine for a few hundred schools; a grid or k-d tree index is the
//! upgrade path for larger data sets.

use crate::utils;
use geo::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Distance below which two markers are considered a nearby pair
///
/// Stored as a great-circle central angle in degrees, which is what the threshold constant
/// `0.00005` has always meant. Use [`ProximityThreshold::from_meters`] to express it as a
/// ground distance instead.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProximityThreshold {
    degrees: f64,
}

impl ProximityThreshold {
    /// Threshold used by the map since the first release (about 5.6 m)
    pub const DEFAULT_DEGREES: f64 = 0.00005;

    pub const fn from_degrees(degrees: f64) -> Self {
        Self { degrees }
    }

    pub fn from_meters(meters: f64) -> Self {
        Self {
            degrees: (meters / utils::EARTH_RADIUS_M).to_degrees(),
        }
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    pub fn to_meters(&self) -> f64 {
        self.degrees.to_radians() * utils::EARTH_RADIUS_M
    }

    /// Whether two lon/lat points are within this threshold of each other (inclusive)
    #[inline]
    pub fn contains(&self, a: Point<f64>, b: Point<f64>) -> bool {
        utils::haversine_central_angle(a, b).to_degrees() <= self.degrees
    }
}

impl Default for ProximityThreshold {
    fn default() -> Self {
        Self::from_degrees(Self::DEFAULT_DEGREES)
    }
}

/// Find disjoint pairs of nearby points
///
/// Returns index pairs `(i, j)` with `i < j`. Every index appears in at most one pair, and the
/// result is deterministic for a fixed input order.
pub fn find_nearby_pairs(points: &[Point<f64>], threshold: ProximityThreshold) -> Vec<(usize, usize)> {
    profiling::scope!("find_nearby_pairs");

    let mut pairs = Vec::new();
    let mut used = vec![false; points.len()];

    for i in 0..points.len() {
        if used[i] {
            continue;
        }

        for j in (i + 1)..points.len() {
            if used[j] {
                continue;
            }

            if threshold.contains(points[i], points[j]) {
                pairs.push((i, j));
                used[i] = true;
                used[j] = true;
                break;
            }
        }
    }

    tracing::trace!("Found {} nearby pairs among {} points", pairs.len(), points.len());
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> Point<f64> {
        Point::new(lon, lat)
    }

    #[test]
    fn test_sao_paulo_points_are_paired() {
        let points = [p(-23.55000, -46.63000), p(-23.55001, -46.63001)];
        let pairs = find_nearby_pairs(&points, ProximityThreshold::from_degrees(0.00005));
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn test_one_degree_apart_is_not_paired() {
        let points = [p(-23.55, -46.63), p(-22.55, -46.63)];
        let pairs = find_nearby_pairs(&points, ProximityThreshold::default());
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_first_match_wins_not_nearest() {
        // Point 1 is farther from 0 than point 2, but is scanned first.
        let points = [
            p(-23.55000, -46.63000),
            p(-23.55003, -46.63000),
            p(-23.55001, -46.63000),
        ];
        let pairs = find_nearby_pairs(&points, ProximityThreshold::default());
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn test_pairs_are_disjoint() {
        // A tight grid where every point is close to every other point.
        let points: Vec<Point<f64>> = (0..9)
            .map(|k| p(-23.55 + (k / 3) as f64 * 1e-6, -46.63 + (k % 3) as f64 * 1e-6))
            .collect();
        let pairs = find_nearby_pairs(&points, ProximityThreshold::default());
        assert_eq!(pairs.len(), 4);

        let mut seen = vec![false; points.len()];
        for &(i, j) in &pairs {
            assert!(i < j);
            assert!(!seen[i] && !seen[j], "index reused in {pairs:?}");
            seen[i] = true;
            seen[j] = true;
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let a = p(0.0, 0.0);
        let b = p(0.0, 0.00005);
        let exact = ProximityThreshold::from_degrees(utils::haversine_central_angle(a, b).to_degrees());
        assert_eq!(find_nearby_pairs(&[a, b], exact), vec![(0, 1)]);
    }

    #[test]
    fn test_meter_conversion() {
        let t = ProximityThreshold::default();
        assert!((t.to_meters() - 5.56).abs() < 0.01, "got {}", t.to_meters());
        let back = ProximityThreshold::from_meters(t.to_meters());
        assert!((back.degrees() - t.degrees()).abs() < 1e-15);
    }

    #[test]
    fn test_empty_and_single_inputs() {
        assert!(find_nearby_pairs(&[], ProximityThreshold::default()).is_empty());
        assert!(find_nearby_pairs(&[p(0.0, 0.0)], ProximityThreshold::default()).is_empty());
    }
}
