//! Walkers plugin that hosts the map session
//!
//! Each frame the plugin translates egui input into engine input events, applies expired timers
//! and paints lands, markers, clusters and the tooltip overlay. Camera fits requested by the
//! engine cannot be applied from inside a plugin (it only sees the map memory immutably), so
//! they are queued in [`PluginShared`] for the app to apply after the map widget ran.

use egui::{Color32, FontId, Pos2, Stroke};
use geo::{Coord, MapCoords, MultiPolygon, Rect, TriangulateEarcut};
use school_map_lib::{
    DetailPayload, InputEvent, InteractionEvent, MapHost, MapSession, MarkerCluster, MarkerIcon,
    Rgba, ScreenPos,
};
use std::sync::{Arc, RwLock};
use walkers::{Plugin, Projector};

/// Names are drawn next to individual markers from this zoom on
const NAME_MIN_ZOOM: f64 = 12.0;

/// Land outline in lon/lat, kept next to the session so frames don't reproject it
pub struct LandOutline {
    pub id: u64,
    pub geometry: MultiPolygon<f64>,
    pub extent: Rect<f64>,
}

/// Camera fit requested by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRequest {
    pub extent: Rect<f64>,
    pub max_zoom: Option<f64>,
}

/// Counters of the last rendered frame
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderStats {
    pub lands_drawn: usize,
    pub markers_drawn: usize,
    pub clusters_drawn: usize,
}

/// State that outlives a single plugin run
#[derive(Default)]
pub struct PluginShared {
    pub fits: Vec<FitRequest>,
    pub opened: Vec<DetailPayload>,
    pub render: RenderStats,
    camera: Option<CameraSnapshot>,
    /// Set once a touch was seen; clicks become taps from then on
    touch_seen: bool,
    pointer_inside: bool,
    /// Tooltip bounds of the last frame, for label taps
    tooltip_rect: Option<egui::Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraSnapshot {
    zoom: f64,
    origin: egui::Vec2,
}

/// [`MapHost`] over the walkers projector of the current frame
struct ProjectorHost<'a> {
    projector: &'a Projector,
    zoom: f64,
    fits: Vec<FitRequest>,
}

impl MapHost for ProjectorHost<'_> {
    fn project(&self, coord: Coord<f64>) -> ScreenPos {
        let v = self.projector.project(walkers::lat_lon(coord.y, coord.x));
        ScreenPos::new(v.x, v.y)
    }

    fn unproject(&self, pos: ScreenPos) -> Coord<f64> {
        let position = self.projector.unproject(egui::Vec2::new(pos.x, pos.y));
        Coord {
            x: position.x(),
            y: position.y(),
        }
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn fit_extent(&mut self, extent: Rect<f64>, max_zoom: Option<f64>) {
        self.fits.push(FitRequest { extent, max_zoom });
    }
}

impl ProjectorHost<'_> {
    fn snapshot(&self) -> CameraSnapshot {
        let origin = self.project(Coord { x: 0.0, y: 0.0 });
        CameraSnapshot {
            zoom: self.zoom,
            origin: egui::vec2(origin.x, origin.y),
        }
    }

    fn pos2(&self, coord: Coord<f64>) -> Pos2 {
        let p = self.project(coord);
        Pos2::new(p.x, p.y)
    }
}

/// Plugin for rendering schools and lands on the map
pub struct SchoolPlugin {
    session: Arc<RwLock<MapSession>>,
    shared: Arc<RwLock<PluginShared>>,
    outlines: Arc<Vec<LandOutline>>,
    /// Origin of the engine clock
    started: instant::Instant,
    show_names: bool,
    show_lands: bool,
}

impl SchoolPlugin {
    pub fn new(
        session: Arc<RwLock<MapSession>>,
        shared: Arc<RwLock<PluginShared>>,
        outlines: Arc<Vec<LandOutline>>,
        started: instant::Instant,
    ) -> Self {
        Self {
            session,
            shared,
            outlines,
            started,
            show_names: false,
            show_lands: true,
        }
    }

    pub fn with_names(mut self, enabled: bool) -> Self {
        self.show_names = enabled;
        self
    }

    pub fn with_lands(mut self, enabled: bool) -> Self {
        self.show_lands = enabled;
        self
    }

    /// Engine input events for this frame, camera moves first
    fn collect_input(
        ui: &egui::Ui,
        response: &egui::Response,
        host: &ProjectorHost<'_>,
        shared: &mut PluginShared,
        tooltip_tappable: bool,
    ) -> Vec<InputEvent> {
        let mut events = Vec::new();

        let camera = host.snapshot();
        if shared.camera.is_some_and(|previous| previous != camera) {
            events.push(InputEvent::CameraMoved);
        }
        shared.camera = Some(camera);

        if ui.input(|i| i.any_touches()) && !shared.touch_seen {
            tracing::debug!("Touch input detected");
            shared.touch_seen = true;
        }

        match response.hover_pos() {
            Some(pos) if !shared.touch_seen => {
                shared.pointer_inside = true;
                events.push(InputEvent::PointerMove {
                    position: ScreenPos::new(pos.x, pos.y),
                });
            }
            None if shared.pointer_inside => {
                shared.pointer_inside = false;
                events.push(InputEvent::PointerLeave);
            }
            _ => {}
        }

        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            let on_label = tooltip_tappable && shared.tooltip_rect.is_some_and(|r| r.contains(pos));
            let position = ScreenPos::new(pos.x, pos.y);
            events.push(if on_label {
                InputEvent::TooltipLabelTap
            } else if shared.touch_seen {
                InputEvent::Tap { position }
            } else {
                InputEvent::Click { position }
            });
        }

        events
    }

    fn render_lands(&self, session: &MapSession, host: &ProjectorHost<'_>, painter: &egui::Painter) -> usize {
        profiling::scope!("render_lands");

        let viewport = painter.clip_rect();
        let mut drawn = 0;

        for outline in self.outlines.iter() {
            let Some(style) = session.land_style(outline.id) else {
                continue;
            };
            let bounds = egui::Rect::from_two_pos(
                host.pos2(outline.extent.min()),
                host.pos2(outline.extent.max()),
            );
            if !bounds.intersects(viewport) {
                continue;
            }

            let screen = outline.geometry.map_coords(|c| {
                let p = host.project(c);
                Coord {
                    x: p.x as f64,
                    y: p.y as f64,
                }
            });

            let fill = color(style.fill);
            let stroke = Stroke::new(style.stroke_width, color(style.stroke));
            for polygon in &screen.0 {
                let triangles = polygon.earcut_triangles_raw();
                let mut mesh = egui::Mesh::default();
                for xy in triangles.vertices.chunks_exact(2) {
                    mesh.colored_vertex(Pos2::new(xy[0] as f32, xy[1] as f32), fill);
                }
                for tri in triangles.triangle_indices.chunks_exact(3) {
                    mesh.add_triangle(tri[0] as u32, tri[1] as u32, tri[2] as u32);
                }
                painter.add(egui::Shape::mesh(mesh));

                for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                    let points: Vec<Pos2> = ring
                        .coords()
                        .map(|c| Pos2::new(c.x as f32, c.y as f32))
                        .collect();
                    painter.extend(egui::Shape::dashed_line(
                        &points,
                        stroke,
                        style.dash[0],
                        style.dash[1],
                    ));
                }
            }
            drawn += 1;
        }
        drawn
    }

    fn render_markers(
        &self,
        session: &mut MapSession,
        host: &ProjectorHost<'_>,
        painter: &egui::Painter,
        stats: &mut RenderStats,
    ) {
        profiling::scope!("render_markers");

        let viewport = painter.clip_rect().expand(48.0);
        let clusters: Vec<MarkerCluster> = session.aggregate(host).to_vec();
        let show_names = self.show_names && host.zoom >= NAME_MIN_ZOOM;

        for cluster in &clusters {
            let center = Pos2::new(cluster.screen_position.x, cluster.screen_position.y);
            if !viewport.contains(center) {
                continue;
            }

            let icon = match cluster.members.first() {
                Some(&id) if cluster.is_single() => session.marker_icon(id),
                _ => session.cluster_icon(cluster),
            };
            let Some(icon) = icon else {
                continue;
            };
            paint_icon(painter, center, &icon);

            if cluster.is_single() {
                stats.markers_drawn += 1;
                if show_names
                    && let Some(marker) = cluster.members.first().and_then(|&id| session.features().marker(id))
                {
                    painter.text(
                        center + egui::vec2(icon.diameter() / 2.0 + 4.0, 0.0),
                        egui::Align2::LEFT_CENTER,
                        marker.record.display_title(),
                        FontId::proportional(11.0),
                        Color32::from_gray(30),
                    );
                }
            } else {
                stats.clusters_drawn += 1;
            }
        }
    }

    /// Paint the live tooltip; returns its bounds
    fn render_tooltip(session: &MapSession, painter: &egui::Painter) -> Option<egui::Rect> {
        let tooltip = session.tooltip()?;
        let padding = egui::vec2(8.0, 4.0);

        let galley = painter.layout_no_wrap(
            tooltip.content.text.clone(),
            FontId::proportional(13.0),
            Color32::WHITE,
        );
        let min = Pos2::new(tooltip.screen_position.x, tooltip.screen_position.y);
        let rect = egui::Rect::from_min_size(min, galley.size() + 2.0 * padding);

        painter.rect_filled(rect, 4.0, Color32::from_black_alpha(200));
        if tooltip.content.tappable {
            painter.rect_stroke(
                rect,
                4.0,
                Stroke::new(1.0, Color32::from_white_alpha(160)),
                egui::StrokeKind::Inside,
            );
        }
        painter.galley(rect.min + padding, galley, Color32::WHITE);
        Some(rect)
    }
}

impl Plugin for SchoolPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("SchoolPlugin::run");

        let (Ok(mut session), Ok(mut shared)) = (self.session.write(), self.shared.write()) else {
            tracing::error!("Map state lock poisoned, skipping frame");
            return;
        };
        let now = self.started.elapsed();
        let mut host = ProjectorHost {
            projector,
            zoom: map_memory.zoom(),
            fits: Vec::new(),
        };

        let tappable = session.tooltip().is_some_and(|t| t.content.tappable);
        let input = Self::collect_input(ui, response, &host, &mut shared, tappable);
        for event in input {
            for emitted in session.handle(event, now, &mut host) {
                if let InteractionEvent::OpenDetail(detail) = emitted {
                    shared.opened.push(detail);
                }
            }
        }
        session.tick(now);

        let painter = ui.painter();
        let mut stats = RenderStats::default();
        if self.show_lands {
            stats.lands_drawn = self.render_lands(&session, &host, painter);
        }
        self.render_markers(&mut session, &host, painter, &mut stats);
        shared.tooltip_rect = Self::render_tooltip(&session, painter);
        shared.render = stats;

        if let Some(deadline) = session.next_deadline() {
            ui.ctx().request_repaint_after(deadline.saturating_sub(now));
        }

        let fits = std::mem::take(&mut host.fits);
        shared.fits.extend(fits);
    }
}

fn color(c: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

/// Paint an icon descriptor as circles: shadow, glow, body, inner dot, badge and count label
fn paint_icon(painter: &egui::Painter, center: Pos2, icon: &MarkerIcon) {
    let radius = icon.diameter() / 2.0;
    let base = color(icon.base_color);

    if icon.shadow {
        painter.circle_filled(center + egui::vec2(1.0, 2.0), radius, Color32::from_black_alpha(60));
    }
    if icon.glow {
        painter.circle_filled(center, radius * 1.35, base.gamma_multiply(0.35));
    }
    painter.circle(center, radius, base, Stroke::new(2.0, color(icon.border_color)));

    match &icon.label {
        Some(label) => {
            let font = FontId::proportional(label.font.size_px as f32);
            // Outline, then fill
            for offset in [egui::vec2(-1.0, 0.0), egui::vec2(1.0, 0.0), egui::vec2(0.0, -1.0), egui::vec2(0.0, 1.0)] {
                painter.text(
                    center + offset,
                    egui::Align2::CENTER_CENTER,
                    &label.text,
                    font.clone(),
                    color(label.stroke),
                );
            }
            painter.text(center, egui::Align2::CENTER_CENTER, &label.text, font, color(label.fill));
        }
        None => {
            painter.circle_filled(center, radius * 0.3, Color32::WHITE);
        }
    }

    if let Some(badge) = &icon.badge {
        let at = center + egui::vec2(radius * 0.75, -radius * 0.75);
        let r = (radius * 0.4).max(5.0);
        painter.circle(at, r, color(badge.color), Stroke::new(1.0, Color32::WHITE));
        painter.text(
            at,
            egui::Align2::CENTER_CENTER,
            badge.glyph,
            FontId::proportional(r * 1.4),
            Color32::WHITE,
        );
    }
}

/// Camera center and zoom that fit `extent`, capped at `max_zoom`
pub fn fit_camera(extent: Rect<f64>, max_zoom: Option<f64>) -> (walkers::Position, f64) {
    let center = extent.center();
    let span = extent.width().max(extent.height());

    let zoom = if span > 0.0 {
        ((4.0 * 360.0 / span).log2() - 0.5).clamp(1.0, 18.0)
    } else {
        18.0
    };
    let zoom = max_zoom.map_or(zoom, |max| zoom.min(max));

    (walkers::lat_lon(center.y, center.x), zoom)
}
