//! Land polygon layer
//!
//! Polygons arrive in the storage CRS (EPSG:4326, lon/lat degrees) with the raw attribute names
//! of the FUNAI land registry. Loading reprojects every feature to the render CRS (spherical Web
//! Mercator, EPSG:3857, see [`crate::utils::storage_to_render`]) and flattens its attributes into
//! a [`LandInfo`]. A feature that cannot be reprojected is dropped and logged; the rest of the
//! layer still loads. Land ids are unique: the first record with an id wins.

use crate::{MapError, Result, utils};
use geo::{BoundingRect, Contains, Coord, MapCoords, MultiPolygon, Point, Rect};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A land polygon as supplied by the data-access layer
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonRecord {
    pub id: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub properties: BTreeMap<String, String>,
    /// Geometry in the storage CRS
    pub geometry: MultiPolygon<f64>,
}

/// Flattened land attributes, shared by tooltips and the detail panel
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LandInfo {
    pub name: Option<String>,
    pub ethnicity: Option<String>,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub area_ha: Option<f64>,
    pub phase: Option<String>,
    pub modality: Option<String>,
    pub admin_unit: Option<String>,
    pub code: Option<String>,
    /// Every attribute not mapped above, verbatim
    pub extra: BTreeMap<String, String>,
}

impl LandInfo {
    /// Build from the raw registry attributes
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Self {
        let mut extra = properties.clone();
        let mut take = |key: &str| {
            extra
                .remove(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let name = take("terrai_nom");
        let ethnicity = take("etnia_nome");
        let municipality = take("municipio_");
        let state = take("uf_sigla");
        let area = take("superficie");
        let phase = take("fase_ti");
        let modality = take("modalidade");
        let admin_unit = take("undadm_nom");
        let code = take("terrai_cod");

        let area_ha = area.as_deref().and_then(|raw| raw.replace(',', ".").parse().ok());

        Self {
            name,
            ethnicity,
            municipality,
            state,
            area_ha,
            phase,
            modality,
            admin_unit,
            code,
            extra,
        }
    }

    /// Tooltip text, e.g. `Terra Indígena Jaraguá`
    pub fn display_name(&self) -> String {
        format!("Terra Indígena {}", self.name.as_deref().unwrap_or("Indígena"))
    }

    pub fn is_regularized(&self) -> bool {
        self.phase
            .as_deref()
            .is_some_and(|phase| phase.eq_ignore_ascii_case("Regularizada"))
    }
}

/// A loaded land polygon
#[derive(Debug, Clone, PartialEq)]
pub struct LandFeature {
    pub id: u64,
    pub info: LandInfo,
    /// Geometry in the render CRS
    pub geometry: MultiPolygon<f64>,
    /// Geographic extent (lon/lat), used for camera fits
    pub extent: Rect<f64>,
    pub hovered: bool,
    pub selected: bool,
}

impl LandFeature {
    /// Whether a geographic coordinate falls inside this land
    pub fn contains(&self, coord: Coord<f64>) -> bool {
        if !in_extent(&self.extent, coord) {
            return false;
        }
        utils::storage_to_render(coord)
            .map(|render| self.geometry.contains(&Point::from(render)))
            .unwrap_or(false)
    }

    /// Geometry back in the storage CRS
    pub fn storage_geometry(&self) -> MultiPolygon<f64> {
        to_storage_crs(&self.geometry)
    }
}

fn in_extent(rect: &Rect<f64>, c: Coord<f64>) -> bool {
    let (min, max) = (rect.min(), rect.max());
    (min.x..=max.x).contains(&c.x) && (min.y..=max.y).contains(&c.y)
}

/// Outcome of a layer load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerReport {
    pub loaded: usize,
    /// Dropped features with the reason they were dropped
    pub dropped: Vec<(u64, MapError)>,
}

/// Reproject a storage geometry (lon/lat) to the render CRS
pub fn to_render_crs(geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
    geometry.try_map_coords(utils::storage_to_render)
}

/// Reproject a render geometry back to the storage CRS
pub fn to_storage_crs(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry.map_coords(utils::render_to_storage)
}

/// All land features of a map session, in draw order
#[derive(Debug, Clone, Default)]
pub struct GeoLayer {
    features: Vec<LandFeature>,
    /// Land id -> index into `features`
    index: HashMap<u64, usize>,
}

impl GeoLayer {
    /// Reproject and enrich an already-fetched polygon collection
    ///
    /// Features are processed in parallel; the output keeps input order.
    pub fn load(records: Vec<PolygonRecord>) -> (Self, LayerReport) {
        profiling::scope!("GeoLayer::load");

        let results: Vec<std::result::Result<LandFeature, (u64, MapError)>> = records
            .into_par_iter()
            .map(Self::load_feature)
            .collect();

        let mut features = Vec::with_capacity(results.len());
        let mut index = HashMap::with_capacity(results.len());
        let mut report = LayerReport::default();
        for result in results {
            match result {
                Ok(feature) if index.contains_key(&feature.id) => {
                    tracing::warn!("Dropping land feature {}: duplicate id", feature.id);
                    report.dropped.push((feature.id, MapError::DuplicateId(feature.id)));
                }
                Ok(feature) => {
                    index.insert(feature.id, features.len());
                    features.push(feature);
                }
                Err((id, error)) => {
                    tracing::warn!("Dropping land feature {id}: {error}");
                    report.dropped.push((id, error));
                }
            }
        }
        report.loaded = features.len();

        tracing::info!(
            "Loaded {} land features ({} dropped)",
            report.loaded,
            report.dropped.len()
        );

        (Self { features, index }, report)
    }

    fn load_feature(record: PolygonRecord) -> std::result::Result<LandFeature, (u64, MapError)> {
        let id = record.id;
        let extent = record.geometry.bounding_rect().ok_or_else(|| {
            (
                id,
                MapError::InvalidGeometry("geometry has no coordinates".into()),
            )
        })?;
        let geometry = to_render_crs(&record.geometry).map_err(|error| (id, error))?;

        Ok(LandFeature {
            id,
            info: LandInfo::from_properties(&record.properties),
            geometry,
            extent,
            hovered: false,
            selected: false,
        })
    }

    pub fn features(&self) -> &[LandFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&LandFeature> {
        self.index.get(&id).map(|&i| &self.features[i])
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut LandFeature> {
        self.index.get(&id).map(|&i| &mut self.features[i])
    }

    pub(crate) fn features_mut(&mut self) -> &mut [LandFeature] {
        &mut self.features
    }

    /// Topmost (last drawn) land containing a geographic coordinate
    pub fn pick(&self, coord: Coord<f64>) -> Option<&LandFeature> {
        self.features.iter().rev().find(|f| f.contains(coord))
    }
}
