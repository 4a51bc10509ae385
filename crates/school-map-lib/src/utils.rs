//! Utility functions for coordinate conversions and great-circle distances
//!
//! Two coordinate reference systems are used throughout the crate:
//! - **Storage CRS** (EPSG:4326): geographic longitude/latitude in degrees, as supplied by the
//!   data-access layer. `Coord::x` is longitude, `Coord::y` is latitude.
//! - **Render CRS** (EPSG:3857): spherical Web Mercator in meters, used for polygon hit testing.

use crate::{MapError, Result};
use geo::{Coord, Point};

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;
pub const EARTH_MERCATOR_MIN: f64 = -20037508.34;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_MERCATOR_LATITUDE: f64 = 85.05112878;

/// Mean Earth radius in meters, shared by the Haversine helpers
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;
const X_TO_LON_FACTOR: f64 = 180.0 / EARTH_MERCATOR_MAX;
const Y_TO_LAT_FACTOR: f64 = std::f64::consts::PI / EARTH_MERCATOR_MAX;

/// Check whether a latitude/longitude pair is inside the geographic domain
///
/// Non-finite values are never valid.
#[inline]
pub fn is_valid_lat_lon(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// Convert a storage coordinate (lon/lat degrees) to the render CRS (Web Mercator meters)
///
/// Unlike a clamping projection, this fails for latitudes outside the Mercator domain so that
/// every successful conversion can be inverted by [`render_to_storage`].
#[inline]
pub fn storage_to_render(coord: Coord<f64>) -> Result<Coord<f64>> {
    let (lon, lat) = (coord.x, coord.y);
    if !is_valid_lat_lon(lat, lon) {
        return Err(MapError::CoordinateConversion(format!(
            "({lon}, {lat}) is outside the geographic domain"
        )));
    }
    if lat.abs() > MAX_MERCATOR_LATITUDE {
        return Err(MapError::CoordinateConversion(format!(
            "latitude {lat} exceeds the Web Mercator limit of {MAX_MERCATOR_LATITUDE}"
        )));
    }

    let lat_rad = lat.to_radians();
    let x = lon * LON_TO_X_FACTOR;
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR;
    Ok(Coord { x, y })
}

/// Convert a render coordinate (Web Mercator meters) back to the storage CRS (lon/lat degrees)
#[inline]
pub fn render_to_storage(coord: Coord<f64>) -> Coord<f64> {
    let lon = coord.x * X_TO_LON_FACTOR;
    let lat = (std::f64::consts::PI / 2.0 - 2.0 * ((-coord.y * Y_TO_LAT_FACTOR).exp()).atan())
        .to_degrees();
    Coord { x: lon, y: lat }
}

/// Check if a render coordinate is within Web Mercator bounds
#[inline]
pub fn is_valid_render(coord: Coord<f64>) -> bool {
    (EARTH_MERCATOR_MIN..=EARTH_MERCATOR_MAX).contains(&coord.x)
        && (EARTH_MERCATOR_MIN..=EARTH_MERCATOR_MAX).contains(&coord.y)
}

/// Great-circle central angle between two lon/lat points, in radians (Haversine formula)
#[inline]
pub fn haversine_central_angle(a: Point<f64>, b: Point<f64>) -> f64 {
    let lat1 = a.y().to_radians();
    let lat2 = b.y().to_radians();
    let delta_lat = (b.y() - a.y()).to_radians();
    let delta_lon = (b.x() - a.x()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Great-circle distance between two lon/lat points, in meters
#[inline]
pub fn haversine_distance_m(a: Point<f64>, b: Point<f64>) -> f64 {
    EARTH_RADIUS_M * haversine_central_angle(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_to_render_origin() {
        let c = storage_to_render(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert!(c.x.abs() < 0.01);
        assert!(c.y.abs() < 0.01);
    }

    #[test]
    fn test_storage_to_render_bounds() {
        let west = storage_to_render(Coord { x: -180.0, y: 0.0 }).unwrap();
        assert!((west.x - EARTH_MERCATOR_MIN).abs() < 1.0);

        let east = storage_to_render(Coord { x: 180.0, y: 0.0 }).unwrap();
        assert!((east.x - EARTH_MERCATOR_MAX).abs() < 1.0);
    }

    #[test]
    fn test_roundtrip_within_epsilon() {
        // São Paulo state, where the land parcels live
        for &(lon, lat) in &[(-46.63, -23.55), (-48.4129, -22.3794), (-53.1, -25.3), (0.0, 0.0)] {
            let render = storage_to_render(Coord { x: lon, y: lat }).unwrap();
            let back = render_to_storage(render);
            assert!((back.x - lon).abs() < 1e-6, "lon drift at ({lon}, {lat})");
            assert!((back.y - lat).abs() < 1e-6, "lat drift at ({lon}, {lat})");
        }
    }

    #[test]
    fn test_polar_latitude_is_rejected() {
        assert!(storage_to_render(Coord { x: 0.0, y: 89.0 }).is_err());
        assert!(storage_to_render(Coord { x: 0.0, y: f64::NAN }).is_err());
        assert!(storage_to_render(Coord { x: 190.0, y: 0.0 }).is_err());
    }

    #[test]
    fn test_is_valid_lat_lon() {
        assert!(is_valid_lat_lon(90.0, 180.0));
        assert!(is_valid_lat_lon(-90.0, -180.0));
        assert!(!is_valid_lat_lon(90.0001, 0.0));
        assert!(!is_valid_lat_lon(0.0, -180.0001));
        assert!(!is_valid_lat_lon(f64::INFINITY, 0.0));
    }

    #[test]
    fn test_is_valid_render() {
        assert!(is_valid_render(Coord { x: 0.0, y: 0.0 }));
        assert!(!is_valid_render(Coord {
            x: EARTH_MERCATOR_MAX + 1.0,
            y: 0.0
        }));
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let a = Point::new(-46.63, -23.55);
        let b = Point::new(-46.63, -22.55);
        let meters = haversine_distance_m(a, b);
        assert!((meters - 111_195.0).abs() < 10.0, "got {meters}");
        assert!((haversine_central_angle(a, b).to_degrees() - 1.0).abs() < 1e-9);
    }
}
