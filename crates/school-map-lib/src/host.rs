//! Host rendering engine abstraction
//!
//! The engine never draws and never owns a camera. Everything it needs from the map widget
//! (projection between geographic coordinates and screen pixels, the current zoom, and camera
//! fits) goes through [`MapHost`].

use geo::{Coord, Rect};

/// A position on screen, in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreenPos {
    pub x: f32,
    pub y: f32,
}

/// An offset on screen, in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreenVec {
    pub dx: f32,
    pub dy: f32,
}

impl ScreenPos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(self, other: ScreenPos) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    #[inline]
    pub fn offset(self, by: ScreenVec) -> ScreenPos {
        ScreenPos {
            x: self.x + by.dx,
            y: self.y + by.dy,
        }
    }
}

impl ScreenVec {
    pub const fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }
}

/// Interface the host map widget exposes to the engine
///
/// Coordinates are in the storage CRS (`x` = longitude, `y` = latitude, degrees).
pub trait MapHost {
    /// Project a geographic coordinate to a screen pixel
    fn project(&self, coord: Coord<f64>) -> ScreenPos;

    /// Inverse of [`MapHost::project`]
    fn unproject(&self, pos: ScreenPos) -> Coord<f64>;

    /// Current zoom level of the camera
    fn zoom(&self) -> f64;

    /// Move the camera so that `extent` is fully visible, never zooming in past `max_zoom`
    fn fit_extent(&mut self, extent: Rect<f64>, max_zoom: Option<f64>);
}
