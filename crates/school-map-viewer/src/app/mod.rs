//! Application module
//!
//! Full-screen slippy map with schools and lands drawn by [`plugin::SchoolPlugin`], plus a
//! toggleable sidebar with the layer settings, load statistics and the detail of the feature
//! opened last.

mod data;
mod plugin;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::plugin::{FitRequest, SchoolPlugin, fit_camera};
use crate::app::settings::Settings;
use crate::app::state::{AppState, TilesProvider};
use eframe::egui;
use walkers::{
    HttpTiles, Map, MapMemory, TileId,
    sources::{Attribution, OpenStreetMap, TileSource},
};

/// CARTO light basemap, muted enough for thematic layers
pub struct CartoLight;

impl TileSource for CartoLight {
    fn tile_url(&self, tile_id: TileId) -> String {
        format!(
            "https://basemaps.cartocdn.com/light_all/{}/{}/{}.png",
            tile_id.zoom, tile_id.x, tile_id.y
        )
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: "© OpenStreetMap contributors © CARTO",
            url: "https://carto.com/attributions",
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        20
    }
}

/// Persisted UI settings; the data itself is reloaded from the CLI paths
#[derive(serde::Serialize, serde::Deserialize)]
struct PersistedSettings {
    sidebar_open: bool,
    tiles_provider: String,
    show_names: bool,
    show_lands: bool,
}

pub struct SchoolMapApp {
    state: AppState,
    tiles_osm: HttpTiles,
    tiles_carto: HttpTiles,
    map_memory: MapMemory,
    /// Origin of the engine clock
    started: instant::Instant,
}

impl SchoolMapApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let cli_args = Settings::from_cli();

        let mut state = AppState::new(&cli_args);
        if !cli_args.ignore_persisted
            && let Some(storage) = cc.storage
        {
            Self::restore_persisted_settings(storage, &mut state);
        }
        state.load(cli_args.points.as_ref(), cli_args.lands.as_ref());

        Self {
            state,
            tiles_osm: HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone()),
            tiles_carto: HttpTiles::new(CartoLight, cc.egui_ctx.clone()),
            map_memory: MapMemory::default(),
            started: instant::Instant::now(),
        }
    }

    fn restore_persisted_settings(storage: &dyn eframe::Storage, state: &mut AppState) {
        let Some(settings) = storage
            .get_string("persisted_settings")
            .and_then(|json| serde_json::from_str::<PersistedSettings>(&json).ok())
        else {
            tracing::info!("No persisted settings found, starting fresh");
            return;
        };

        let ui = &mut state.ui_settings;
        ui.sidebar_open = settings.sidebar_open;
        ui.show_names |= settings.show_names;
        ui.show_lands = settings.show_lands;
        ui.tiles_provider = match settings.tiles_provider.as_str() {
            "OpenStreetMap" => TilesProvider::OpenStreetMap,
            _ => TilesProvider::CartoLight,
        };
        tracing::info!("Restored UI settings");
    }

    fn apply_fit(&mut self, fit: FitRequest) {
        let (center, zoom) = fit_camera(fit.extent, fit.max_zoom);
        self.map_memory.center_at(center);
        let _ = self.map_memory.set_zoom(zoom);
        tracing::trace!("Camera fit to {:?}, zoom {zoom:.1}", fit.extent);
    }

    /// Take what the plugin left behind this frame
    fn drain_plugin_output(&mut self) {
        let (fits, opened, render) = {
            let Ok(mut shared) = self.state.shared.write() else {
                return;
            };
            (
                std::mem::take(&mut shared.fits),
                std::mem::take(&mut shared.opened),
                shared.render,
            )
        };

        self.state.stats.render = render;
        for fit in fits {
            self.apply_fit(fit);
        }
        if let Some(detail) = opened.into_iter().last() {
            self.state.open_detail(detail);
        }
    }
}

#[profiling::all_functions]
impl eframe::App for SchoolMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.state.pending_fit_bounds {
            self.state.pending_fit_bounds = false;
            if let Some(extent) = self.state.data_extent() {
                self.apply_fit(FitRequest {
                    extent,
                    max_zoom: None,
                });
            }
        }

        ui_panels::render_sidebar(ctx, &mut self.state);

        let session = self.state.session.clone();
        let shared = self.state.shared.clone();
        let outlines = self.state.outlines.clone();
        let show_names = self.state.ui_settings.show_names;
        let show_lands = self.state.ui_settings.show_lands;
        let tiles_provider = self.state.ui_settings.tiles_provider;
        let started = self.started;

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let frame_start = instant::Instant::now();

                let plugin = SchoolPlugin::new(session, shared, outlines, started)
                    .with_names(show_names)
                    .with_lands(show_lands);

                let tiles: &mut HttpTiles = match tiles_provider {
                    TilesProvider::OpenStreetMap => &mut self.tiles_osm,
                    TilesProvider::CartoLight => &mut self.tiles_carto,
                };

                let map = Map::new(
                    Some(tiles),
                    &mut self.map_memory,
                    walkers::lat_lon(-23.55, -46.63),
                )
                .with_plugin(plugin);

                ui.add(map);

                self.state.stats.last_frame_time_ms = frame_start.elapsed().as_secs_f64() * 1000.0;

                ui_panels::sidebar_toggle_button(ui, &mut self.state);

                let screen_rect = ui.max_rect();
                ui.painter().text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    tiles_provider.attribution(),
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );
            });

        self.drain_plugin_output();
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let ui = &self.state.ui_settings;
        let settings = PersistedSettings {
            sidebar_open: ui.sidebar_open,
            tiles_provider: ui.tiles_provider.name().to_string(),
            show_names: ui.show_names,
            show_lands: ui.show_lands,
        };

        if let Ok(json) = serde_json::to_string(&settings) {
            storage.set_string("persisted_settings", json);
            tracing::debug!("Saved settings on exit");
        }
    }
}
