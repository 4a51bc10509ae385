//! UI panels for the application
//!
//! Sidebar with a map tab (layers, tiles, statistics, load errors) and a detail tab showing the
//! feature opened last.

use crate::app::state::{AppState, SidebarTab, TilesProvider};
use egui::{Color32, RichText, Ui};
use school_map_lib::{FeaturePayload, InputMode, LandInfo, PointRecord};

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_rect =
        egui::Rect::from_min_size(rect.right_top() + egui::vec2(-button_size.x - margin, margin), button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());
    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open { "✕" } else { "☰" };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Render the sidebar (side on landscape, bottom on portrait)
pub fn render_sidebar(ctx: &egui::Context, state: &mut AppState) {
    if !state.ui_settings.sidebar_open {
        return;
    }

    let screen_size = ctx.viewport_rect().size();
    if screen_size.y > screen_size.x {
        egui::TopBottomPanel::bottom("main_sidebar")
            .default_height(280.0)
            .min_height(180.0)
            .max_height(ctx.viewport_rect().height() * 0.6)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, state));
    } else {
        egui::SidePanel::right("main_sidebar")
            .default_width(320.0)
            .min_width(260.0)
            .max_width(450.0)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, state));
    }
}

fn render_sidebar_content(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        ui.selectable_value(&mut state.ui_settings.active_tab, SidebarTab::Map, "🗺 Map");
        ui.selectable_value(&mut state.ui_settings.active_tab, SidebarTab::Detail, "📋 Detail");
    });

    ui.separator();

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| match state.ui_settings.active_tab {
            SidebarTab::Map => render_map_tab(ui, state),
            SidebarTab::Detail => render_detail_tab(ui, state),
        });
}

fn render_map_tab(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("🎨 Layers").strong());
    ui.add_space(6.0);
    ui.checkbox(&mut state.ui_settings.show_lands, "Indigenous lands");
    ui.checkbox(&mut state.ui_settings.show_names, "School names (zoom ≥ 12)");

    ui.add_space(12.0);
    ui.separator();
    ui.add_space(8.0);

    ui.label(RichText::new("🗺 Map Tiles").strong());
    ui.add_space(6.0);
    for provider in TilesProvider::all() {
        let selected = state.ui_settings.tiles_provider == *provider;
        if ui.selectable_label(selected, provider.name()).clicked() {
            state.ui_settings.tiles_provider = *provider;
        }
    }

    ui.add_space(12.0);
    ui.separator();
    ui.add_space(8.0);

    render_stats_section(ui, state);

    if !state.errors.is_empty() {
        ui.add_space(8.0);
        ui.separator();
        ui.label(RichText::new("⚠ Errors").strong().color(Color32::RED));
        ui.add_space(4.0);

        egui::ScrollArea::vertical()
            .id_salt("errors_scroll")
            .max_height(120.0)
            .show(ui, |ui| {
                for (source, error) in &state.errors {
                    ui.label(RichText::new(format!("{source}: {error}")).small().color(Color32::RED));
                }
            });

        ui.add_space(4.0);
        if ui.button("Clear Errors").clicked() {
            state.errors.clear();
        }
    }
}

fn render_stats_section(ui: &mut Ui, state: &AppState) {
    ui.label(RichText::new("📊 Statistics").strong());
    ui.add_space(4.0);

    let summary = &state.stats.summary;
    let render = &state.stats.render;
    let (mode, cache) = match state.session.try_read() {
        Ok(session) => (session.input_mode(), session.style_cache_stats()),
        Err(_) => (None, (0, 0)),
    };

    egui::Grid::new("stats_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            let row = |ui: &mut Ui, label: &str, value: String| {
                ui.label(label);
                ui.label(RichText::new(value).strong());
                ui.end_row();
            };

            row(ui, "Schools:", summary.ingest.accepted.to_string());
            row(ui, "Excluded:", format!(
                "{} (missing {}, out of range {}, duplicate {})",
                summary.ingest.excluded(),
                summary.ingest.excluded_missing,
                summary.ingest.excluded_out_of_range,
                summary.ingest.excluded_duplicate_id
            ));
            row(ui, "Nearby pairs:", summary.nearby_pairs.to_string());
            row(ui, "Lands:", format!(
                "{} ({} dropped)",
                summary.layer.loaded,
                summary.layer.dropped.len()
            ));

            ui.separator();
            ui.separator();
            ui.end_row();

            row(ui, "Input:", match mode {
                Some(InputMode::Pointer) => "pointer".to_string(),
                Some(InputMode::Touch) => "touch".to_string(),
                None => "not yet known".to_string(),
            });
            row(ui, "Drawn:", format!(
                "{} markers, {} clusters, {} lands",
                render.markers_drawn, render.clusters_drawn, render.lands_drawn
            ));
            row(ui, "Icon cache:", format!("{} hits, {} misses", cache.0, cache.1));

            ui.label("Frame Time:");
            let time_color = if state.stats.last_frame_time_ms < 16.0 {
                Color32::GREEN
            } else if state.stats.last_frame_time_ms < 50.0 {
                Color32::YELLOW
            } else {
                Color32::RED
            };
            ui.label(RichText::new(format!("{:.1} ms", state.stats.last_frame_time_ms)).color(time_color));
            ui.end_row();
        });
}

fn render_detail_tab(ui: &mut Ui, state: &mut AppState) {
    let Some(detail) = state.detail.clone() else {
        ui.label(
            RichText::new("Click a school or double-click a land to see its details")
                .small()
                .weak(),
        );
        return;
    };

    match &detail.payload {
        FeaturePayload::Marker(record) => render_school(ui, record),
        FeaturePayload::Land(info) => render_land(ui, info),
    }

    ui.add_space(12.0);
    if ui.button("Close").clicked() {
        state.close_detail();
    }
}

fn render_school(ui: &mut Ui, record: &PointRecord) {
    ui.label(RichText::new(format!("🏫 {}", record.display_title())).strong().size(16.0));
    ui.add_space(6.0);

    egui::Grid::new("school_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
                ui.label("Location:");
                ui.label(format!("{lat:.5}, {lon:.5}"));
                ui.end_row();
            }
            for (key, value) in &record.attributes {
                ui.label(format!("{}:", humanize(key)));
                ui.label(value);
                ui.end_row();
            }
        });
}

fn render_land(ui: &mut Ui, info: &LandInfo) {
    ui.label(RichText::new(format!("🌳 {}", info.display_name())).strong().size(16.0));
    if info.is_regularized() {
        ui.label(RichText::new("Regularized").small().color(Color32::from_rgb(220, 20, 60)));
    }
    ui.add_space(6.0);

    let fields = [
        ("Ethnicity", info.ethnicity.clone()),
        ("Municipality", info.municipality.clone()),
        ("State", info.state.clone()),
        ("Area", info.area_ha.map(|ha| format!("{ha:.2} ha"))),
        ("Phase", info.phase.clone()),
        ("Modality", info.modality.clone()),
        ("Administrative unit", info.admin_unit.clone()),
        ("Code", info.code.clone()),
    ];

    egui::Grid::new("land_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            for (label, value) in fields {
                if let Some(value) = value {
                    ui.label(format!("{label}:"));
                    ui.label(value);
                    ui.end_row();
                }
            }
            for (key, value) in &info.extra {
                ui.label(format!("{}:", humanize(key)));
                ui.label(value);
                ui.end_row();
            }
        });
}

/// `diretoria_ensino` -> `Diretoria ensino`
fn humanize(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
