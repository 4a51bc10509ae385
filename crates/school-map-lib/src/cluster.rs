//! Screen-space aggregation of markers into tiered clusters

use crate::host::{MapHost, ScreenPos};
use crate::record::MarkerFeature;
use crate::tier::{Aggregate, ClusterTier, TierTable};
use geo::{Coord, Rect};
use smallvec::SmallVec;

/// One drawable aggregate of markers, a single marker included
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerCluster {
    /// Marker ids, in input order
    pub members: SmallVec<[u64; 4]>,
    /// Mean geographic position of the members
    pub position: Coord<f64>,
    /// Where the aggregate is drawn
    pub screen_position: ScreenPos,
    /// Geographic extent of the members
    pub extent: Rect<f64>,
    pub aggregate: Aggregate,
}

impl MarkerCluster {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn is_single(&self) -> bool {
        matches!(self.aggregate, Aggregate::Single)
    }

    pub fn tier(&self) -> Option<ClusterTier> {
        match self.aggregate {
            Aggregate::Single => None,
            Aggregate::Cluster(tier) => Some(tier),
        }
    }
}

/// Group screen positions that lie within `distance_px` of each other
///
/// Greedy: each position not yet assigned, in input order, seeds a group and absorbs every later
/// unassigned position within `distance_px` of the seed. Groups are returned in seed order and
/// every index appears in exactly one group.
pub fn aggregate_screen_positions(positions: &[ScreenPos], distance_px: f32) -> Vec<SmallVec<[usize; 4]>> {
    profiling::scope!("aggregate_screen_positions");

    let mut assigned = vec![false; positions.len()];
    let mut groups = Vec::new();

    for seed in 0..positions.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;

        let mut group: SmallVec<[usize; 4]> = SmallVec::new();
        group.push(seed);
        for other in (seed + 1)..positions.len() {
            if !assigned[other] && positions[seed].distance(positions[other]) <= distance_px {
                assigned[other] = true;
                group.push(other);
            }
        }
        groups.push(group);
    }

    groups
}

/// Maximum zoom of the camera fit performed when a cluster is clicked
///
/// Larger clusters zoom in less, and the fit always zooms in by at least one level.
pub fn cluster_fit_zoom(count: usize, current_zoom: f64) -> f64 {
    let target: f64 = match count {
        c if c > 20 => 10.0,
        c if c > 10 => 11.0,
        c if c > 5 => 12.0,
        _ => 13.0,
    };
    target.max(current_zoom + 1.0)
}

/// Aggregate markers for the current camera
///
/// At or above `disable_at_zoom` every marker is returned on its own.
pub(crate) fn cluster_markers(
    markers: &[MarkerFeature],
    host: &dyn MapHost,
    distance_px: f32,
    disable_at_zoom: f64,
    table: &TierTable,
) -> Vec<MarkerCluster> {
    profiling::scope!("cluster_markers");

    let positions: Vec<ScreenPos> = markers.iter().map(|m| host.project(m.position.into())).collect();

    let groups: Vec<SmallVec<[usize; 4]>> = if host.zoom() >= disable_at_zoom {
        (0..markers.len()).map(|index| SmallVec::from_elem(index, 1)).collect()
    } else {
        aggregate_screen_positions(&positions, distance_px)
    };

    groups
        .into_iter()
        .map(|group| {
            if let [index] = group.as_slice() {
                let coord: Coord<f64> = markers[*index].position.into();
                return MarkerCluster {
                    members: SmallVec::from_elem(markers[*index].id(), 1),
                    position: coord,
                    screen_position: positions[*index],
                    extent: Rect::new(coord, coord),
                    aggregate: Aggregate::Single,
                };
            }

            let coords: SmallVec<[Coord<f64>; 4]> =
                group.iter().map(|&i| Coord::from(markers[i].position)).collect();
            let n = coords.len() as f64;
            let position = Coord {
                x: coords.iter().map(|c| c.x).sum::<f64>() / n,
                y: coords.iter().map(|c| c.y).sum::<f64>() / n,
            };
            let (min, max) = coords.iter().skip(1).fold((coords[0], coords[0]), |(min, max), c| {
                (
                    Coord {
                        x: min.x.min(c.x),
                        y: min.y.min(c.y),
                    },
                    Coord {
                        x: max.x.max(c.x),
                        y: max.y.max(c.y),
                    },
                )
            });

            MarkerCluster {
                members: group.iter().map(|&i| markers[i].id()).collect(),
                position,
                screen_position: host.project(position),
                extent: Rect::new(min, max),
                aggregate: table.classify(group.len()),
            }
        })
        .collect()
}
