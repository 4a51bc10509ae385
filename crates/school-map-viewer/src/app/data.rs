//! Loading schools and lands from disk
//!
//! Schools come as a JSON array of flat objects; lands as a GeoJSON `FeatureCollection` of
//! `Polygon`/`MultiPolygon` features in EPSG:4326. Records the engine cannot use are left for
//! [`school_map_lib::validate_points`] and the land layer to count and drop; only malformed files
//! are errors here.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use school_map_lib::{PointRecord, PolygonRecord};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected format: {0}")]
    Format(String),
}

/// Keys tried, in order, for the display title of a school
const TITLE_KEYS: [&str; 4] = ["title", "titulo", "nome", "name"];

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_points(path: &Path) -> Result<Vec<PointRecord>, LoadError> {
    let points = parse_points(&read(path)?)?;
    tracing::info!("Read {} school records from {}", points.len(), path.display());
    Ok(points)
}

pub fn load_lands(path: &Path) -> Result<Vec<PolygonRecord>, LoadError> {
    let lands = parse_lands(&read(path)?)?;
    tracing::info!("Read {} land features from {}", lands.len(), path.display());
    Ok(lands)
}

/// Parse a JSON array of school objects
///
/// `latitude`/`longitude` may be numbers or numeric strings; anything else is kept as missing.
/// Records without an `id` are numbered by their position in the array.
pub fn parse_points(json: &str) -> Result<Vec<PointRecord>, LoadError> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(items) = value else {
        return Err(LoadError::Format("expected an array of school records".into()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(object) => Ok(point_from_object(index, object)),
            other => Err(LoadError::Format(format!(
                "record {index} is not an object: {other}"
            ))),
        })
        .collect()
}

fn point_from_object(index: usize, mut object: Map<String, Value>) -> PointRecord {
    let id = object
        .remove("id")
        .as_ref()
        .and_then(as_u64)
        .unwrap_or(index as u64);
    let latitude = object.remove("latitude").as_ref().and_then(as_f64);
    let longitude = object.remove("longitude").as_ref().and_then(as_f64);

    let mut title = String::new();
    for key in TITLE_KEYS {
        if let Some(Value::String(value)) = object.remove(key)
            && title.is_empty()
        {
            title = value;
        }
    }

    PointRecord {
        id,
        latitude,
        longitude,
        title,
        attributes: scalar_properties(object),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Flatten scalar values to strings, skipping nulls, arrays and nested objects
fn scalar_properties(object: Map<String, Value>) -> BTreeMap<String, String> {
    object
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect()
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum Geometry {
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

/// Parse a GeoJSON `FeatureCollection` of land polygons
///
/// Features with a missing or non-polygonal geometry are skipped and logged. The feature id is
/// taken from the feature itself, then from a `gid`/`id` property, then from its position. A
/// positional id may clash with an explicit one; the layer keeps the first and reports the other.
pub fn parse_lands(json: &str) -> Result<Vec<PolygonRecord>, LoadError> {
    let collection: FeatureCollection = serde_json::from_str(json)?;

    let mut records = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();
        let id = feature
            .id
            .as_ref()
            .or_else(|| properties.get("gid"))
            .or_else(|| properties.get("id"))
            .and_then(as_u64)
            .unwrap_or(index as u64);

        let geometry = feature
            .geometry
            .and_then(|g| serde_json::from_value::<Geometry>(g).ok())
            .map(|g| match g {
                Geometry::Polygon(rings) => MultiPolygon(vec![polygon(rings)]),
                Geometry::MultiPolygon(polygons) => {
                    MultiPolygon(polygons.into_iter().map(polygon).collect())
                }
            });

        match geometry {
            Some(geometry) => records.push(PolygonRecord {
                id,
                properties: scalar_properties(properties),
                geometry,
            }),
            None => tracing::warn!("Skipping land feature {id}: not a polygon"),
        }
    }
    Ok(records)
}

fn polygon(rings: Vec<Vec<Vec<f64>>>) -> Polygon<f64> {
    let mut rings = rings.into_iter().map(ring);
    let exterior = rings.next().unwrap_or_else(|| LineString(Vec::new()));
    Polygon::new(exterior, rings.collect())
}

/// Positions may carry an altitude; only lon/lat are kept
fn ring(positions: Vec<Vec<f64>>) -> LineString<f64> {
    positions
        .into_iter()
        .filter_map(|p| match p.as_slice() {
            [x, y, ..] => Some(Coord { x: *x, y: *y }),
            _ => None,
        })
        .collect()
}

/// Built-in data shown when no files are given
pub fn demo_points() -> Vec<PointRecord> {
    vec![
        PointRecord::new(1, -23.55000, -46.63000, "EE Indígena Txeru Ba'e Kua-I")
            .with_attribute("municipio", "São Paulo")
            .with_attribute("povos_indigenas", "Guarani Mbya"),
        PointRecord::new(2, -23.55001, -46.63001, "EEI Djekupé Amba Arandy")
            .with_attribute("municipio", "São Paulo")
            .with_attribute("povos_indigenas", "Guarani Mbya"),
        PointRecord::new(3, -23.4420, -46.7640, "EEI Guarani Nhandeva")
            .with_attribute("municipio", "São Paulo"),
        PointRecord::new(4, -22.3890, -49.0120, "EEI Índia Vanuíre")
            .with_attribute("municipio", "Arco-Íris")
            .with_attribute("povos_indigenas", "Kaingang"),
        PointRecord::new(5, -22.3500, -49.0500, "EEI Aldeia Ekeruá")
            .with_attribute("municipio", "Avaí")
            .with_attribute("povos_indigenas", "Terena"),
        PointRecord::new(6, -24.5900, -47.9800, "")
            .with_attribute("municipio", "Iguape"),
        PointRecord::new(7, -23.8200, -46.7900, "EEI Aldeia Rio Branco")
            .with_attribute("municipio", "Itanhaém"),
        PointRecord::new(8, -23.8250, -46.7950, "EEI Aldeia Tangará")
            .with_attribute("municipio", "Itanhaém"),
    ]
}

pub fn demo_lands() -> Vec<PolygonRecord> {
    let square = |id: u64, lon: f64, lat: f64, size: f64, props: &[(&str, &str)]| PolygonRecord {
        id,
        properties: props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        geometry: MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (lon, lat),
                (lon + size, lat),
                (lon + size, lat + size),
                (lon, lat + size),
                (lon, lat),
            ]),
            vec![],
        )]),
    };

    vec![
        square(
            100,
            -49.10,
            -22.45,
            0.12,
            &[
                ("terrai_nom", "Araribá"),
                ("etnia_nome", "Guarani, Terena"),
                ("municipio_", "Avaí"),
                ("uf_sigla", "SP"),
                ("superficie", "1930,00"),
                ("fase_ti", "Regularizada"),
            ],
        ),
        square(
            101,
            -46.80,
            -23.47,
            0.05,
            &[
                ("terrai_nom", "Jaraguá"),
                ("etnia_nome", "Guarani"),
                ("municipio_", "São Paulo"),
                ("uf_sigla", "SP"),
                ("fase_ti", "Declarada"),
            ],
        ),
    ]
}
