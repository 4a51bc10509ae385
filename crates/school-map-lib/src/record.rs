//! Point records and their validation into marker features

use crate::tier::ClusterTier;
use crate::utils;
use geo::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A school as supplied by the data-access layer
///
/// Coordinates are optional because upstream records are edited by hand and may be incomplete.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointRecord {
    pub id: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub title: String,
    /// Free-form attributes (municipality, ethnicity, school level...)
    #[cfg_attr(feature = "serde", serde(default))]
    pub attributes: BTreeMap<String, String>,
}

impl PointRecord {
    pub fn new(id: u64, latitude: f64, longitude: f64, title: impl Into<String>) -> Self {
        Self {
            id,
            latitude: Some(latitude),
            longitude: Some(longitude),
            title: title.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Title used by tooltips, with the same fallback the detail panel uses
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Escola Indígena"
        } else {
            &self.title
        }
    }
}

/// A validated record plus the state derived from it
///
/// Created on ingest and recreated wholesale on every rebuild. Only the interaction layer
/// mutates `hovered`/`selected`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerFeature {
    pub record: PointRecord,
    /// Geographic position (`x` = longitude, `y` = latitude)
    pub position: Point<f64>,
    pub is_nearby_pair: bool,
    pub pair_partner: Option<u64>,
    /// Tier of the cluster this marker was last aggregated into (`None` when shown on its own)
    pub tier: Option<ClusterTier>,
    pub hovered: bool,
    pub selected: bool,
}

impl MarkerFeature {
    pub fn id(&self) -> u64 {
        self.record.id
    }
}

/// Diagnostics for a point ingest pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IngestReport {
    pub accepted: usize,
    pub excluded_missing: usize,
    pub excluded_out_of_range: usize,
    pub excluded_duplicate_id: usize,
}

impl IngestReport {
    pub fn excluded(&self) -> usize {
        self.excluded_missing + self.excluded_out_of_range + self.excluded_duplicate_id
    }
}

/// Keep the records that can be rendered, preserving input order
///
/// Records with missing, non-finite or out-of-range coordinates are excluded and counted, never
/// reported as errors. A record reusing an id already accepted is excluded as well.
pub fn validate_points(records: Vec<PointRecord>) -> (Vec<MarkerFeature>, IngestReport) {
    profiling::scope!("validate_points");

    let mut report = IngestReport::default();
    let mut seen = HashSet::with_capacity(records.len());
    let mut markers = Vec::with_capacity(records.len());

    for record in records {
        let (Some(lat), Some(lon)) = (record.latitude, record.longitude) else {
            report.excluded_missing += 1;
            tracing::trace!("Excluding school {}: missing coordinates", record.id);
            continue;
        };

        if !utils::is_valid_lat_lon(lat, lon) {
            report.excluded_out_of_range += 1;
            tracing::trace!("Excluding school {}: ({lat}, {lon}) out of range", record.id);
            continue;
        }

        if !seen.insert(record.id) {
            report.excluded_duplicate_id += 1;
            tracing::warn!("Excluding school {}: duplicate id", record.id);
            continue;
        }

        markers.push(MarkerFeature {
            position: Point::new(lon, lat),
            record,
            is_nearby_pair: false,
            pair_partner: None,
            tier: None,
            hovered: false,
            selected: false,
        });
    }

    report.accepted = markers.len();
    if report.excluded() > 0 {
        tracing::debug!(
            "Point ingest: {} accepted, {} excluded",
            report.accepted,
            report.excluded()
        );
    }

    (markers, report)
}
