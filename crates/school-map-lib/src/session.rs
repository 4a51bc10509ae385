//! One interactive map instance

use crate::cluster::{MarkerCluster, cluster_markers};
use crate::config::SessionConfig;
use crate::feature::{FeatureId, FeatureSet, PickTarget};
use crate::geo_layer::{LayerReport, PolygonRecord};
use crate::host::{MapHost, ScreenPos};
use crate::interaction::{
    InputEvent, InputMode, InteractionCoordinator, InteractionEvent, InteractionState, ModeSelection,
    Resources,
};
use crate::record::{IngestReport, PointRecord};
use crate::style::{LandStyle, MarkerIcon, MarkerState, MarkerStyleFactory, land_style};
use crate::timer::TimerQueue;
use crate::tooltip::{TooltipOverlay, TooltipOverlayManager};
use geo::Coord;
use std::sync::Arc;
use std::time::Duration;

/// Diagnostics of a data refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildSummary {
    pub ingest: IngestReport,
    pub layer: LayerReport,
    pub nearby_pairs: usize,
    /// Events caused by the refresh itself, e.g. a `HoverExit` for a hovered feature that vanished
    pub events: Vec<InteractionEvent>,
}

/// Camera key the cached aggregation was computed for
#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraKey {
    zoom: f64,
    origin: ScreenPos,
}

impl CameraKey {
    fn of(host: &dyn MapHost) -> Self {
        Self {
            zoom: host.zoom(),
            origin: host.project(Coord { x: 0.0, y: 0.0 }),
        }
    }
}

/// Everything one map instance owns: data, style cache, timers, tooltip and interaction state
///
/// Several sessions can live side by side; nothing is shared between them.
pub struct MapSession {
    config: SessionConfig,
    features: FeatureSet,
    coordinator: InteractionCoordinator,
    tooltip: TooltipOverlayManager,
    timers: TimerQueue,
    styles: MarkerStyleFactory,
    clusters: Vec<MarkerCluster>,
    clusters_for: Option<CameraKey>,
}

impl MapSession {
    pub fn new(config: SessionConfig, mode: ModeSelection) -> Self {
        Self {
            coordinator: InteractionCoordinator::new(mode),
            tooltip: TooltipOverlayManager::new(config.tooltip_offset),
            timers: TimerQueue::new(),
            styles: MarkerStyleFactory::new(config.marker_size_px),
            features: FeatureSet::default(),
            clusters: Vec::new(),
            clusters_for: None,
            config,
        }
    }

    /// Replace the feature set with one built from fresh input sequences
    ///
    /// Interaction state that refers to vanished features is dropped. Losing the hovered feature
    /// is reported as a `HoverExit` in [`RebuildSummary::events`].
    pub fn rebuild(&mut self, points: Vec<PointRecord>, polygons: Vec<PolygonRecord>) -> RebuildSummary {
        profiling::scope!("MapSession::rebuild");

        let (features, ingest, layer) =
            FeatureSet::build(points, polygons, self.config.proximity_threshold);
        self.features = features;
        self.clusters.clear();
        self.clusters_for = None;

        let events = self
            .coordinator
            .on_refresh(&mut self.features, &mut self.tooltip, &mut self.timers);

        let summary = RebuildSummary {
            ingest,
            layer,
            nearby_pairs: self.features.nearby_pair_count(),
            events,
        };
        tracing::debug!(
            "Rebuilt map session: {} markers, {} lands, {} nearby pairs",
            self.features.markers().len(),
            self.features.lands().len(),
            summary.nearby_pairs
        );
        summary
    }

    /// Feed one input event at time `now`
    ///
    /// Timers due at `now` are applied first, so an event arriving after a deadline always sees
    /// the expired state even if the host has not called [`MapSession::tick`] in between.
    pub fn handle(&mut self, event: InputEvent, now: Duration, host: &mut dyn MapHost) -> Vec<InteractionEvent> {
        profiling::scope!("MapSession::handle");

        self.tick(now);

        let target = match event.position() {
            Some(position) => self.pick(position, host),
            None => None,
        };

        let mut res = Resources {
            features: &mut self.features,
            tooltip: &mut self.tooltip,
            timers: &mut self.timers,
            host,
            config: &self.config,
            now,
        };
        let events = self.coordinator.handle(event, target, &mut res);

        for event in &events {
            if let InteractionEvent::HoverEnter(_) | InteractionEvent::HoverExit(_) = event {
                tracing::trace!("{event:?}");
            }
        }
        events
    }

    /// Apply timers due at `now`
    pub fn tick(&mut self, now: Duration) {
        let fired = self.timers.take_expired(now);
        if fired.is_empty() {
            return;
        }
        self.coordinator
            .on_timers(&fired, &mut self.features, &mut self.tooltip, &mut self.timers);
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Cancel all timers and the tooltip and clear interaction flags
    pub fn teardown(&mut self) {
        self.coordinator
            .teardown(&mut self.features, &mut self.tooltip, &mut self.timers);
        debug_assert!(self.timers.is_empty());
    }

    /// The detail panel was closed
    pub fn clear_selection(&mut self) {
        self.coordinator.clear_selection(&mut self.features);
    }

    /// Marker aggregates for the current camera, in draw order
    pub fn aggregate(&mut self, host: &dyn MapHost) -> &[MarkerCluster] {
        let key = CameraKey::of(host);
        if self.clusters_for != Some(key) {
            self.clusters = cluster_markers(
                self.features.markers(),
                host,
                self.config.cluster_distance_px,
                self.config.disable_clustering_at_zoom,
                &self.config.tier_table,
            );
            self.clusters_for = Some(key);

            for cluster in &self.clusters {
                let tier = cluster.tier();
                for &id in &cluster.members {
                    if let Some(marker) = self.features.marker_mut(id) {
                        marker.tier = tier;
                    }
                }
            }
        }
        &self.clusters
    }

    /// What lies under a screen position
    pub fn pick(&mut self, position: ScreenPos, host: &dyn MapHost) -> Option<PickTarget> {
        self.aggregate(host);

        let marker_size = self.config.marker_size_px as f32;
        let tiers = &self.config.tier_table;
        let features = &self.features;
        features.pick(position, host, &self.clusters, |visual| match visual.tier() {
            Some(tier) => tiers.style(tier).pixel_diameter as f32 / 2.0,
            None => {
                let state = visual
                    .members
                    .first()
                    .map(|&id| marker_state(features, id))
                    .unwrap_or_default();
                marker_size * state.scale() / 2.0
            }
        })
    }

    /// Icon of a single marker in its current state
    pub fn marker_icon(&mut self, id: u64) -> Option<Arc<MarkerIcon>> {
        self.features.marker(id)?;
        let state = marker_state(&self.features, id);
        Some(self.styles.marker_icon(state))
    }

    /// Icon of an aggregate; `None` for single markers
    pub fn cluster_icon(&mut self, cluster: &MarkerCluster) -> Option<Arc<MarkerIcon>> {
        let tier = cluster.tier()?;
        let style = self.config.tier_table.style(tier);
        Some(self.styles.cluster_icon(cluster.count(), style))
    }

    pub fn land_style(&self, id: u64) -> Option<LandStyle> {
        let land = self.features.land(id)?;
        Some(land_style(&land.info, land.hovered || land.selected))
    }

    /// (hits, misses) of the icon cache
    pub fn style_cache_stats(&self) -> (u64, u64) {
        self.styles.cache_stats()
    }

    pub fn state(&self) -> InteractionState {
        self.coordinator.state()
    }

    pub fn input_mode(&self) -> Option<InputMode> {
        self.coordinator.mode()
    }

    pub fn coordinator(&self) -> &InteractionCoordinator {
        &self.coordinator
    }

    pub fn selected(&self) -> Option<FeatureId> {
        self.coordinator.selected()
    }

    pub fn tooltip(&self) -> Option<&TooltipOverlay> {
        self.tooltip.current()
    }

    pub fn live_tooltips(&self) -> usize {
        self.tooltip.live_count()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn marker_state(features: &FeatureSet, id: u64) -> MarkerState {
    features
        .marker(id)
        .map(|marker| MarkerState {
            hovered: marker.hovered,
            selected: marker.selected,
            nearby_pair: marker.is_nearby_pair,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_layer::tests::square;
    use crate::host::testing::FakeHost;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn session() -> (MapSession, FakeHost) {
        let mut session = MapSession::new(SessionConfig::default(), ModeSelection::Auto);
        session.rebuild(
            vec![
                PointRecord::new(1, -22.5, -47.5, "Escola Tekoa"),
                PointRecord::new(2, -22.2, -47.2, "Escola Nhandeva"),
            ],
            vec![square(10, -48.0, -23.0, 1.0, "Araribá")],
        );
        (session, FakeHost::new(Coord { x: -48.0, y: -22.0 }, 100.0))
    }

    #[test]
    fn test_mode_locks_on_first_event() {
        let (mut session, mut host) = session();
        assert_eq!(session.input_mode(), None);
        session.handle(InputEvent::CameraMoved, ms(0), &mut host);
        assert_eq!(session.input_mode(), None);
        session.handle(InputEvent::Tap { position: ScreenPos::new(-500.0, -500.0) }, ms(10), &mut host);
        assert_eq!(session.input_mode(), Some(InputMode::Touch));
        session.handle(InputEvent::Click { position: ScreenPos::new(-500.0, -500.0) }, ms(20), &mut host);
        assert_eq!(session.input_mode(), Some(InputMode::Touch));
    }

    #[test]
    fn test_marker_click_selects_and_restyles() {
        let (mut session, mut host) = session();
        let plain = session.marker_icon(1).unwrap();
        let at_marker = host.project(Coord { x: -47.5, y: -22.5 });

        let events = session.handle(InputEvent::Click { position: at_marker }, ms(0), &mut host);
        assert!(matches!(events.as_slice(), [InteractionEvent::OpenDetail(d)] if d.id == FeatureId::Marker(1)));
        assert_eq!(session.selected(), Some(FeatureId::Marker(1)));

        let selected = session.marker_icon(1).unwrap();
        assert!(selected.scale > plain.scale);

        session.clear_selection();
        assert_eq!(session.selected(), None);
        assert!(!session.features().marker(1).unwrap().selected);
    }

    #[test]
    fn test_aggregate_is_cached_per_camera() {
        let (mut session, mut host) = session();
        assert_eq!(session.aggregate(&host).len(), 2);
        host.scale = 1.0;
        // At 1 px per degree both markers fall into one cluster
        let clusters = session.aggregate(&host);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count(), 2);
        let tier = clusters[0].tier();
        assert_eq!(session.features().marker(1).unwrap().tier, tier);
        let cluster = session.aggregate(&host)[0].clone();
        assert!(session.cluster_icon(&cluster).is_some());
    }

    #[test]
    fn test_land_style_tracks_hover() {
        let (mut session, mut host) = session();
        assert_eq!(session.land_style(10).unwrap().stroke_width, 2.0);
        let on_land = host.project(Coord { x: -47.8, y: -22.8 });
        session.handle(InputEvent::PointerMove { position: on_land }, ms(0), &mut host);
        assert_eq!(session.land_style(10).unwrap().stroke_width, 3.0);
        assert_eq!(session.state(), InteractionState::Hovering(FeatureId::Land(10)));
    }

    #[test]
    fn test_teardown_cancels_everything() {
        let (mut session, mut host) = session();
        let on_land = host.project(Coord { x: -47.8, y: -22.8 });
        session.handle(InputEvent::PointerMove { position: on_land }, ms(0), &mut host);
        session.handle(InputEvent::Click { position: on_land }, ms(10), &mut host);
        assert_eq!(session.pending_timers(), 1);
        assert_eq!(session.live_tooltips(), 1);

        session.teardown();
        assert_eq!(session.pending_timers(), 0);
        assert_eq!(session.live_tooltips(), 0);
        assert_eq!(session.state(), InteractionState::Idle);
    }
}
