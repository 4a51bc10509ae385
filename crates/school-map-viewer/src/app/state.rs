//! Application state management
//!
//! This module owns the map session, the data loaded into it and the UI settings.

use crate::app::data::{self, LoadError};
use crate::app::plugin::{LandOutline, PluginShared, RenderStats};
use crate::app::settings::Settings;
use school_map_lib::{
    DetailPayload, MapSession, PointRecord, PolygonRecord, RebuildSummary,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Main application state
pub struct AppState {
    /// The engine session drawn by the map plugin
    pub session: Arc<RwLock<MapSession>>,

    /// Output the plugin leaves for the app after each frame
    pub shared: Arc<RwLock<PluginShared>>,

    /// Lon/lat outlines of the loaded lands, rebuilt with the session
    pub outlines: Arc<Vec<LandOutline>>,

    pub ui_settings: UiSettings,

    /// Detail panel content, set by the last `open-detail`
    pub detail: Option<DetailPayload>,

    /// Load errors, by source
    pub errors: Vec<(String, String)>,

    pub stats: Stats,

    /// Fit the camera to every feature on the next frame
    pub pending_fit_bounds: bool,
}

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone)]
pub struct UiSettings {
    pub tiles_provider: TilesProvider,
    pub sidebar_open: bool,
    pub active_tab: SidebarTab,
    /// Draw school names next to individual markers
    pub show_names: bool,
    pub show_lands: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SidebarTab {
    Map,
    Detail,
}

/// Available map tile providers
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TilesProvider {
    OpenStreetMap,
    CartoLight,
}

impl TilesProvider {
    pub fn attribution(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "© OpenStreetMap contributors",
            Self::CartoLight => "© OpenStreetMap contributors © CARTO",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::OpenStreetMap, Self::CartoLight]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "OpenStreetMap",
            Self::CartoLight => "CARTO Light",
        }
    }
}

/// Statistics about the loaded data and the last frame
#[derive(Default, Clone)]
pub struct Stats {
    pub summary: RebuildSummary,
    pub render: RenderStats,
    pub last_frame_time_ms: f64,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let config = settings.session_config();
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!("Invalid CLI configuration ({e}), using defaults");
                Default::default()
            }
        };

        Self {
            session: Arc::new(RwLock::new(MapSession::new(config, settings.mode_selection()))),
            shared: Arc::new(RwLock::new(PluginShared::default())),
            outlines: Arc::new(Vec::new()),
            ui_settings: UiSettings {
                tiles_provider: TilesProvider::CartoLight,
                sidebar_open: true,
                active_tab: SidebarTab::Map,
                show_names: settings.show_names,
                show_lands: true,
            },
            detail: None,
            errors: Vec::new(),
            stats: Stats::default(),
            pending_fit_bounds: false,
        }
    }

    /// Load the files named on the command line (or the demo data) into the session
    pub fn load(&mut self, points: Option<&PathBuf>, lands: Option<&PathBuf>) {
        profiling::scope!("AppState::load");

        let points = match points {
            Some(path) => self.collect(path, data::load_points(path)),
            None => data::demo_points(),
        };
        let lands = match lands {
            Some(path) => self.collect(path, data::load_lands(path)),
            None => data::demo_lands(),
        };
        self.rebuild(points, lands);
    }

    fn collect<T>(&mut self, path: &Path, result: Result<Vec<T>, LoadError>) -> Vec<T> {
        result.unwrap_or_else(|e| {
            tracing::error!("Failed to load {}: {e}", path.display());
            self.errors.push((path.display().to_string(), e.to_string()));
            Vec::new()
        })
    }

    /// Replace the session data
    pub fn rebuild(&mut self, points: Vec<PointRecord>, lands: Vec<PolygonRecord>) {
        let Ok(mut session) = self.session.write() else {
            tracing::error!("Map session lock poisoned, skipping rebuild");
            return;
        };
        let summary = session.rebuild(points, lands);
        self.outlines = Arc::new(
            session
                .features()
                .lands()
                .features()
                .iter()
                .map(|land| LandOutline {
                    id: land.id,
                    geometry: land.storage_geometry(),
                    extent: land.extent,
                })
                .collect(),
        );

        for (id, reason) in &summary.layer.dropped {
            self.errors.push((format!("land {id}"), reason.to_string()));
        }
        if let Some(detail) = &self.detail
            && !session.features().contains(detail.id)
        {
            self.detail = None;
        }

        tracing::info!(
            "Loaded {} schools ({} excluded) and {} lands",
            summary.ingest.accepted,
            summary.ingest.excluded(),
            summary.layer.loaded
        );
        self.stats.summary = summary;
        self.pending_fit_bounds = true;
    }

    /// Show the detail of a feature in the sidebar
    pub fn open_detail(&mut self, detail: DetailPayload) {
        tracing::debug!("Opening detail of {:?}", detail.id);
        self.detail = Some(detail);
        self.ui_settings.sidebar_open = true;
        self.ui_settings.active_tab = SidebarTab::Detail;
    }

    /// Close the detail panel and drop the selection highlight
    pub fn close_detail(&mut self) {
        self.detail = None;
        if let Ok(mut session) = self.session.write() {
            session.clear_selection();
        }
    }

    /// Lon/lat extent of every loaded school and land
    pub fn data_extent(&self) -> Option<geo::Rect<f64>> {
        let session = self.session.read().ok()?;
        let features = session.features();

        let markers = features.markers().iter().map(|m| {
            let c: geo::Coord<f64> = m.position.into();
            geo::Rect::new(c, c)
        });
        let lands = features.lands().features().iter().map(|l| l.extent);

        markers.chain(lands).reduce(|a, b| {
            geo::Rect::new(
                geo::Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                geo::Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use school_map_lib::{FeatureId, FeaturePayload};

    fn state() -> AppState {
        AppState::new(&Settings::parse_from(["school-map-viewer"]))
    }

    #[test]
    fn test_load_without_files_uses_demo_data() {
        let mut state = state();
        state.load(None, None);
        assert!(state.errors.is_empty());
        assert_eq!(state.stats.summary.ingest.accepted, data::demo_points().len());
        assert!(state.pending_fit_bounds);
        assert_eq!(state.outlines.len(), 2);

        let extent = state.data_extent().unwrap();
        assert!(extent.min().x <= -49.10 && extent.max().x >= -46.63);
        assert!(extent.min().y <= -24.59 && extent.max().y >= -22.35);
    }

    #[test]
    fn test_load_errors_are_collected() {
        let mut state = state();
        let missing = PathBuf::from("/nonexistent/terras.geojson");
        state.load(None, Some(&missing));
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.stats.summary.layer.loaded, 0);
        assert!(state.stats.summary.ingest.accepted > 0);
    }

    #[test]
    fn test_duplicate_land_ids_are_reported() {
        let mut state = state();
        let mut lands = data::demo_lands();
        let mut clash = lands[1].clone();
        clash.id = lands[0].id;
        lands.push(clash);

        state.rebuild(data::demo_points(), lands);
        assert_eq!(state.stats.summary.layer.loaded, 2);
        assert_eq!(state.outlines.len(), 2);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].0, format!("land {}", data::demo_lands()[0].id));
    }

    #[test]
    fn test_detail_is_dropped_when_feature_vanishes() {
        let mut state = state();
        state.load(None, None);
        let record = PointRecord::new(1, -23.55, -46.63, "Escola");
        state.open_detail(DetailPayload {
            id: FeatureId::Marker(1),
            payload: FeaturePayload::Marker(record.clone()),
        });
        assert_eq!(state.ui_settings.active_tab, SidebarTab::Detail);
        assert_eq!(state.detail.as_ref().map(|d| d.id), Some(FeatureId::Marker(1)));

        state.rebuild(vec![PointRecord { id: 2, ..record }], Vec::new());
        assert!(state.detail.is_none());

        state.close_detail();
        assert_eq!(state.session.read().unwrap().selected(), None);
    }
}
