//! The feature set of a map session: markers and lands behind one tagged identifier

use crate::cluster::MarkerCluster;
use crate::geo_layer::{GeoLayer, LandFeature, LandInfo, LayerReport, PolygonRecord};
use crate::host::{MapHost, ScreenPos};
use crate::proximity::{ProximityThreshold, find_nearby_pairs};
use crate::record::{IngestReport, MarkerFeature, PointRecord, validate_points};
use crate::tier::Aggregate;
use geo::{Coord, Point, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies a feature of either kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FeatureId {
    Marker(u64),
    Land(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FeatureKind {
    Marker,
    Land,
}

impl FeatureId {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureId::Marker(_) => FeatureKind::Marker,
            FeatureId::Land(_) => FeatureKind::Land,
        }
    }
}

/// Attributes handed to the detail panel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "payload", rename_all = "lowercase"))]
pub enum FeaturePayload {
    Marker(PointRecord),
    Land(LandInfo),
}

/// Payload of an `open-detail` event
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetailPayload {
    pub id: FeatureId,
    pub payload: FeaturePayload,
}

/// What sits under a screen position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickTarget {
    Feature(FeatureId),
    /// An aggregate of several markers, which has no detail of its own
    Cluster { count: usize, extent: Rect<f64> },
}

/// Every renderable feature, rebuilt wholesale on each data refresh
#[derive(Debug, Default)]
pub struct FeatureSet {
    markers: Vec<MarkerFeature>,
    marker_index: HashMap<u64, usize>,
    lands: GeoLayer,
}

impl FeatureSet {
    /// Validate points, flag nearby pairs and load the land layer
    pub fn build(
        points: Vec<PointRecord>,
        polygons: Vec<PolygonRecord>,
        threshold: ProximityThreshold,
    ) -> (Self, IngestReport, LayerReport) {
        profiling::scope!("FeatureSet::build");

        let (mut markers, ingest) = validate_points(points);

        let positions: Vec<Point<f64>> = markers.iter().map(|m| m.position).collect();
        for (i, j) in find_nearby_pairs(&positions, threshold) {
            let (id_i, id_j) = (markers[i].id(), markers[j].id());
            markers[i].is_nearby_pair = true;
            markers[i].pair_partner = Some(id_j);
            markers[j].is_nearby_pair = true;
            markers[j].pair_partner = Some(id_i);
        }

        let marker_index = markers
            .iter()
            .enumerate()
            .map(|(index, marker)| (marker.id(), index))
            .collect();

        let (lands, layer) = GeoLayer::load(polygons);

        (
            Self {
                markers,
                marker_index,
                lands,
            },
            ingest,
            layer,
        )
    }

    pub fn markers(&self) -> &[MarkerFeature] {
        &self.markers
    }

    pub fn lands(&self) -> &GeoLayer {
        &self.lands
    }

    pub fn marker(&self, id: u64) -> Option<&MarkerFeature> {
        self.marker_index.get(&id).map(|&index| &self.markers[index])
    }

    pub fn land(&self, id: u64) -> Option<&LandFeature> {
        self.lands.get(id)
    }

    pub fn nearby_pair_count(&self) -> usize {
        self.markers.iter().filter(|m| m.is_nearby_pair).count() / 2
    }

    /// Existence guard used before every semantic emission
    pub fn contains(&self, id: FeatureId) -> bool {
        match id {
            FeatureId::Marker(id) => self.marker_index.contains_key(&id),
            FeatureId::Land(id) => self.lands.get(id).is_some(),
        }
    }

    pub fn payload(&self, id: FeatureId) -> Option<DetailPayload> {
        let payload = match id {
            FeatureId::Marker(marker) => FeaturePayload::Marker(self.marker(marker)?.record.clone()),
            FeatureId::Land(land) => FeaturePayload::Land(self.land(land)?.info.clone()),
        };
        Some(DetailPayload { id, payload })
    }

    /// Display name shown in tooltips
    pub fn tooltip_text(&self, id: FeatureId) -> Option<String> {
        match id {
            FeatureId::Marker(marker) => Some(self.marker(marker)?.record.display_title().to_string()),
            FeatureId::Land(land) => Some(self.land(land)?.info.display_name()),
        }
    }

    /// Geographic extent of a feature, a degenerate rectangle for markers
    pub fn extent(&self, id: FeatureId) -> Option<Rect<f64>> {
        match id {
            FeatureId::Marker(marker) => {
                let c: Coord<f64> = self.marker(marker)?.position.into();
                Some(Rect::new(c, c))
            }
            FeatureId::Land(land) => Some(self.land(land)?.extent),
        }
    }

    /// Set the hovered flag; returns `false` if the feature is gone
    pub(crate) fn set_hovered(&mut self, id: FeatureId, hovered: bool) -> bool {
        match id {
            FeatureId::Marker(marker) => self.marker_mut(marker).map(|m| m.hovered = hovered).is_some(),
            FeatureId::Land(land) => self.lands.get_mut(land).map(|l| l.hovered = hovered).is_some(),
        }
    }

    /// Set the selected flag; returns `false` if the feature is gone
    pub(crate) fn set_selected(&mut self, id: FeatureId, selected: bool) -> bool {
        match id {
            FeatureId::Marker(marker) => self
                .marker_mut(marker)
                .map(|m| m.selected = selected)
                .is_some(),
            FeatureId::Land(land) => self
                .lands
                .get_mut(land)
                .map(|l| l.selected = selected)
                .is_some(),
        }
    }

    pub(crate) fn clear_flags(&mut self) {
        for marker in &mut self.markers {
            marker.hovered = false;
            marker.selected = false;
        }
        for land in self.lands.features_mut() {
            land.hovered = false;
            land.selected = false;
        }
    }

    pub(crate) fn marker_mut(&mut self, id: u64) -> Option<&mut MarkerFeature> {
        let index = *self.marker_index.get(&id)?;
        self.markers.get_mut(index)
    }

    /// Resolve a screen position to at most one target
    ///
    /// `visuals` are the marker aggregates in draw order and `radius` gives the on-screen hit
    /// radius of each. The last drawn aggregate under the pixel wins; lands are only considered
    /// when no marker or cluster is hit.
    pub fn pick<F>(
        &self,
        pos: ScreenPos,
        host: &dyn MapHost,
        visuals: &[MarkerCluster],
        mut radius: F,
    ) -> Option<PickTarget>
    where
        F: FnMut(&MarkerCluster) -> f32,
    {
        profiling::scope!("FeatureSet::pick");

        for visual in visuals.iter().rev() {
            if visual.screen_position.distance(pos) > radius(visual) {
                continue;
            }
            match (visual.aggregate, visual.members.first()) {
                (Aggregate::Single, Some(&id)) => return Some(PickTarget::Feature(FeatureId::Marker(id))),
                (Aggregate::Cluster(_), _) => {
                    return Some(PickTarget::Cluster {
                        count: visual.count(),
                        extent: visual.extent,
                    });
                }
                (Aggregate::Single, None) => {}
            }
        }

        self.lands
            .pick(host.unproject(pos))
            .map(|land| PickTarget::Feature(FeatureId::Land(land.id)))
    }
}
