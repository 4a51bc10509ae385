//! School Map Library - Clustering, Proximity Pairing and Interaction Engine
//!
//! This library drives an interactive map of point markers (indigenous schools) and boundary
//! polygons (indigenous lands) drawn over a base map. It owns everything that is not pixels:
//! validation of the input records, proximity pairing, screen-space aggregation into tiered
//! clusters, icon descriptors, polygon reprojection, and the pointer/touch state machine that
//! turns raw input into semantic events.
//!
//! # Architecture
//!
//! - **[`find_nearby_pairs`]**: greedy great-circle pairing of markers that sit on top of each other
//! - **[`TierTable`]**: maps an aggregate count to a visual [`ClusterTier`]
//! - **[`MarkerStyleFactory`]**: deterministic, memoised [`MarkerIcon`] descriptors
//! - **[`GeoLayer`]**: reprojects land polygons from EPSG:4326 to EPSG:3857
//! - **[`InteractionCoordinator`]**: hover / click / double-click / tap state machine
//! - **[`TooltipOverlayManager`]**: the single transient tooltip of a map session
//! - **[`MapSession`]**: owns all of the above for one map instance
//!
//! The host rendering engine is abstracted behind [`MapHost`]. Nothing in this crate blocks,
//! spawns threads, or reads a clock: time is always passed in by the caller.

mod cluster;
mod config;
mod feature;
mod geo_layer;
mod host;
mod interaction;
mod proximity;
mod record;
mod session;
mod style;
mod tier;
mod timer;
mod tooltip;
pub mod utils;

// Public API exports
pub use cluster::{MarkerCluster, aggregate_screen_positions, cluster_fit_zoom};
pub use config::SessionConfig;
pub use feature::{DetailPayload, FeatureId, FeatureKind, FeaturePayload, FeatureSet, PickTarget};
pub use geo_layer::{GeoLayer, LandFeature, LandInfo, LayerReport, PolygonRecord};
pub use host::{MapHost, ScreenPos, ScreenVec};
pub use interaction::{
    InputEvent, InputMode, InteractionCoordinator, InteractionEvent, InteractionState,
    ModeSelection,
};
pub use proximity::{ProximityThreshold, find_nearby_pairs};
pub use record::{IngestReport, MarkerFeature, PointRecord, validate_points};
pub use session::{MapSession, RebuildSummary};
pub use style::{
    Badge, IconKey, IconLabel, LandStyle, MarkerIcon, MarkerState, MarkerStyleFactory, Rgba,
    land_style,
};
pub use tier::{Aggregate, ClusterTier, FontSpec, TierStyle, TierTable};
pub use timer::{FiredTimer, TimerHandle, TimerKind, TimerQueue};
pub use tooltip::{TooltipContent, TooltipOverlay, TooltipOverlayManager};

/// Error types for the map engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("Coordinate conversion error: {0}")]
    CoordinateConversion(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Duplicate feature id {0}")]
    DuplicateId(u64),

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Unknown feature: {0:?}")]
    UnknownFeature(FeatureId),
}

pub type Result<T> = std::result::Result<T, MapError>;
