//! End-to-end interaction scenarios against a deterministic host
//!
//! Time is passed explicitly, so no test sleeps.

use geo::{Coord, LineString, MultiPolygon, Polygon, Rect};
use school_map_lib::{
    FeatureId, FeaturePayload, InputEvent, InputMode, InteractionEvent, InteractionState,
    MapHost, MapSession, ModeSelection, PointRecord, PolygonRecord, ScreenPos, SessionConfig,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Linear projection: `scale` pixels per degree around `origin`, y pointing down
struct TestHost {
    origin: Coord<f64>,
    scale: f64,
    zoom: f64,
    fits: Vec<(Rect<f64>, Option<f64>)>,
}

impl TestHost {
    fn new() -> Self {
        Self {
            origin: Coord { x: -48.0, y: -22.0 },
            scale: 100.0,
            zoom: 8.0,
            fits: Vec::new(),
        }
    }

    fn at(&self, lon: f64, lat: f64) -> ScreenPos {
        self.project(Coord { x: lon, y: lat })
    }
}

impl MapHost for TestHost {
    fn project(&self, coord: Coord<f64>) -> ScreenPos {
        ScreenPos::new(
            ((coord.x - self.origin.x) * self.scale) as f32,
            ((self.origin.y - coord.y) * self.scale) as f32,
        )
    }

    fn unproject(&self, pos: ScreenPos) -> Coord<f64> {
        Coord {
            x: self.origin.x + pos.x as f64 / self.scale,
            y: self.origin.y - pos.y as f64 / self.scale,
        }
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn fit_extent(&mut self, extent: Rect<f64>, max_zoom: Option<f64>) {
        self.fits.push((extent, max_zoom));
    }
}

const MARKER_M: u64 = 1;
const MARKER_N: u64 = 2;
const LAND_P: u64 = 10;
const LAND_Q: u64 = 11;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn land(id: u64, lon: f64, lat: f64, name: &str) -> PolygonRecord {
    let size = 0.5;
    let ring = LineString::from(vec![
        (lon, lat),
        (lon + size, lat),
        (lon + size, lat + size),
        (lon, lat + size),
        (lon, lat),
    ]);
    let mut properties = BTreeMap::new();
    properties.insert("terrai_nom".to_string(), name.to_string());
    properties.insert("etnia_nome".to_string(), "Guarani".to_string());
    PolygonRecord {
        id,
        properties,
        geometry: MultiPolygon::new(vec![Polygon::new(ring, vec![])]),
    }
}

fn points() -> Vec<PointRecord> {
    vec![
        PointRecord::new(MARKER_M, -22.2, -46.0, "Escola Tekoa Pyau"),
        PointRecord::new(MARKER_N, -22.8, -45.5, "Escola Nhandeva"),
    ]
}

fn lands() -> Vec<PolygonRecord> {
    vec![
        land(LAND_P, -48.0, -23.0, "Araribá"),
        land(LAND_Q, -47.4, -23.0, "Icatu"),
    ]
}

fn session(mode: ModeSelection) -> (MapSession, TestHost) {
    let mut session = MapSession::new(SessionConfig::default(), mode);
    let summary = session.rebuild(points(), lands());
    assert_eq!(summary.ingest.accepted, 2);
    assert_eq!(summary.layer.loaded, 2);
    (session, TestHost::new())
}

fn open_details(events: &[InteractionEvent]) -> Vec<FeatureId> {
    events
        .iter()
        .filter_map(|event| match event {
            InteractionEvent::OpenDetail(detail) => Some(detail.id),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Pointer scenarios
// ============================================================================

#[test]
fn scenario_a_hover_marker_then_move_off() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);
    let nowhere = host.at(-44.0, -20.0);

    let mut events = session.handle(InputEvent::PointerMove { position: on_m }, ms(0), &mut host);
    assert_eq!(events, vec![InteractionEvent::HoverEnter(FeatureId::Marker(MARKER_M))]);
    assert_eq!(session.input_mode(), Some(InputMode::Pointer));
    let tooltip = session.tooltip().expect("hover shows a tooltip");
    assert_eq!(tooltip.content.text, "Escola Tekoa Pyau");
    assert!(!tooltip.content.tappable);
    assert!(session.features().marker(MARKER_M).unwrap().hovered);

    // Staying on the marker does not repeat the enter event
    let nudged = ScreenPos::new(on_m.x + 2.0, on_m.y);
    events.extend(session.handle(InputEvent::PointerMove { position: nudged }, ms(16), &mut host));
    assert_eq!(session.live_tooltips(), 1);

    events.extend(session.handle(InputEvent::PointerMove { position: nowhere }, ms(32), &mut host));
    assert_eq!(
        events,
        vec![
            InteractionEvent::HoverEnter(FeatureId::Marker(MARKER_M)),
            InteractionEvent::HoverExit(FeatureId::Marker(MARKER_M)),
        ]
    );
    assert!(session.tooltip().is_none());
    assert!(!session.features().marker(MARKER_M).unwrap().hovered);
    assert_eq!(session.state(), InteractionState::Idle);
}

#[test]
fn scenario_b_double_click_land_opens_detail_once() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_p = host.at(-47.75, -22.75);

    let first = session.handle(InputEvent::Click { position: on_p }, ms(1_000), &mut host);
    assert!(open_details(&first).is_empty());
    assert_eq!(host.fits.len(), 1, "first click previews by fitting the camera");
    let (extent, max_zoom) = host.fits[0];
    assert!((extent.min().x - (-48.0)).abs() < 1e-9);
    assert!((extent.max().y - (-22.5)).abs() < 1e-9);
    assert_eq!(max_zoom, None);
    assert!(matches!(
        session.state(),
        InteractionState::AwaitingSecondClick { feature: FeatureId::Land(LAND_P), .. }
    ));

    let second = session.handle(InputEvent::Click { position: on_p }, ms(1_200), &mut host);
    assert_eq!(open_details(&second), vec![FeatureId::Land(LAND_P)]);
    match &second[0] {
        InteractionEvent::OpenDetail(detail) => match &detail.payload {
            FeaturePayload::Land(info) => {
                assert_eq!(info.name.as_deref(), Some("Araribá"));
                assert_eq!(info.ethnicity.as_deref(), Some("Guarani"));
            }
            other => panic!("expected a land payload, got {other:?}"),
        },
        other => panic!("expected open-detail, got {other:?}"),
    }
    assert_eq!(session.state(), InteractionState::Idle);
    assert_eq!(session.pending_timers(), 0);
    assert_eq!(host.fits.len(), 1);
}

#[test]
fn scenario_c_expired_window_then_other_land() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_p = host.at(-47.75, -22.75);
    let on_q = host.at(-47.15, -22.75);

    let mut events = session.handle(InputEvent::Click { position: on_p }, ms(0), &mut host);
    events.extend(session.handle(InputEvent::Click { position: on_q }, ms(400), &mut host));

    assert!(open_details(&events).is_empty());
    assert_eq!(host.fits.len(), 2);
    assert!(matches!(
        session.state(),
        InteractionState::AwaitingSecondClick { feature: FeatureId::Land(LAND_Q), .. }
    ));
    assert_eq!(session.pending_timers(), 1);
}

#[test]
fn pointer_expired_window_clears_silently() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_p = host.at(-47.75, -22.75);

    session.handle(InputEvent::Click { position: on_p }, ms(0), &mut host);
    session.tick(ms(299));
    assert!(matches!(session.state(), InteractionState::AwaitingSecondClick { .. }));
    session.tick(ms(300));
    assert_eq!(session.state(), InteractionState::Idle);

    // A late second click starts a new cycle instead of opening the detail
    let late = session.handle(InputEvent::Click { position: on_p }, ms(350), &mut host);
    assert!(open_details(&late).is_empty());
    assert_eq!(host.fits.len(), 2);
}

#[test]
fn pointer_click_on_other_land_within_window_supersedes() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_p = host.at(-47.75, -22.75);
    let on_q = host.at(-47.15, -22.75);

    session.handle(InputEvent::Click { position: on_p }, ms(0), &mut host);
    let events = session.handle(InputEvent::Click { position: on_q }, ms(100), &mut host);
    assert!(open_details(&events).is_empty());
    // Only Q's timer is left
    assert_eq!(session.pending_timers(), 1);

    let events = session.handle(InputEvent::Click { position: on_q }, ms(250), &mut host);
    assert_eq!(open_details(&events), vec![FeatureId::Land(LAND_Q)]);
}

#[test]
fn pointer_marker_click_is_final_and_cancels_pending_land() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_p = host.at(-47.75, -22.75);
    let on_m = host.at(-46.0, -22.2);

    session.handle(InputEvent::Click { position: on_p }, ms(0), &mut host);
    let events = session.handle(InputEvent::Click { position: on_m }, ms(100), &mut host);
    assert_eq!(open_details(&events), vec![FeatureId::Marker(MARKER_M)]);
    assert_eq!(session.state(), InteractionState::Idle);
    assert_eq!(session.pending_timers(), 0);
    assert_eq!(session.selected(), Some(FeatureId::Marker(MARKER_M)));

    // Each click on a marker is its own completed sequence
    let events = session.handle(InputEvent::Click { position: on_m }, ms(150), &mut host);
    assert_eq!(open_details(&events), vec![FeatureId::Marker(MARKER_M)]);
}

#[test]
fn pointer_cluster_click_zooms_without_detail() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    // Zoomed out far enough for both markers to share one cluster
    host.scale = 10.0;
    let clusters = session.aggregate(&host).to_vec();
    let cluster = clusters.iter().find(|c| c.count() == 2).expect("markers cluster");

    let events = session.handle(
        InputEvent::Click {
            position: cluster.screen_position,
        },
        ms(0),
        &mut host,
    );
    assert!(events.is_empty());
    assert_eq!(host.fits.len(), 1);
    let (extent, max_zoom) = host.fits[0];
    assert_eq!(max_zoom, Some(13.0));
    assert!((extent.min().x - (-46.0)).abs() < 1e-9);
    assert!((extent.max().x - (-45.5)).abs() < 1e-9);
}

#[test]
fn pointer_leave_ends_hover() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_p = host.at(-47.75, -22.75);

    session.handle(InputEvent::PointerMove { position: on_p }, ms(0), &mut host);
    assert_eq!(session.state(), InteractionState::Hovering(FeatureId::Land(LAND_P)));
    let events = session.handle(InputEvent::PointerLeave, ms(10), &mut host);
    assert_eq!(events, vec![InteractionEvent::HoverExit(FeatureId::Land(LAND_P))]);
    assert_eq!(session.live_tooltips(), 0);
}

// ============================================================================
// Touch scenarios
// ============================================================================

#[test]
fn scenario_d_tap_tooltip_times_out() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);

    let events = session.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    assert!(events.is_empty());
    assert_eq!(session.input_mode(), Some(InputMode::Touch));

    let tooltip = session.tooltip().expect("tap shows a tooltip");
    assert_eq!(tooltip.content.text, "Escola Tekoa Pyau");
    assert!(tooltip.content.tappable);
    assert!(tooltip.dismiss_timer.is_some());
    assert_eq!(session.coordinator().last_tapped(), Some(FeatureId::Marker(MARKER_M)));

    session.tick(ms(2_999));
    assert!(session.tooltip().is_some());
    session.tick(ms(3_000));
    assert!(session.tooltip().is_none());
    assert_eq!(session.coordinator().last_tapped(), None);
    assert_eq!(session.pending_timers(), 0);
    assert!(!session.features().marker(MARKER_M).unwrap().hovered);
}

#[test]
fn scenario_e_double_tap_opens_detail_once() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);

    let mut events = session.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    events.extend(session.handle(InputEvent::Tap { position: on_m }, ms(1_500), &mut host));

    assert_eq!(open_details(&events), vec![FeatureId::Marker(MARKER_M)]);
    assert!(session.tooltip().is_none());
    assert_eq!(session.pending_timers(), 0);

    // The dismiss deadline passing later changes nothing
    session.tick(ms(10_000));
    assert_eq!(session.selected(), Some(FeatureId::Marker(MARKER_M)));
}

#[test]
fn touch_label_tap_opens_detail() {
    let (mut session, mut host) = session(ModeSelection::Fixed(InputMode::Touch));
    let on_p = host.at(-47.75, -22.75);

    session.handle(InputEvent::Tap { position: on_p }, ms(0), &mut host);
    assert_eq!(
        session.tooltip().map(|t| t.content.text.as_str()),
        Some("Terra Indígena Araribá")
    );
    assert!(host.fits.is_empty(), "touch taps on lands do not move the camera");

    let events = session.handle(InputEvent::TooltipLabelTap, ms(500), &mut host);
    assert_eq!(open_details(&events), vec![FeatureId::Land(LAND_P)]);
    assert!(session.tooltip().is_none());

    // Nothing left to tap
    let events = session.handle(InputEvent::TooltipLabelTap, ms(600), &mut host);
    assert!(events.is_empty());
}

#[test]
fn touch_tap_on_other_feature_replaces_tooltip() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);
    let on_n = host.at(-45.5, -22.8);

    session.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    let events = session.handle(InputEvent::Tap { position: on_n }, ms(500), &mut host);
    assert!(events.is_empty());
    assert_eq!(session.live_tooltips(), 1);
    assert_eq!(session.pending_timers(), 1);
    assert_eq!(session.coordinator().last_tapped(), Some(FeatureId::Marker(MARKER_N)));
    assert!(!session.features().marker(MARKER_M).unwrap().hovered);

    // M is no longer the last tapped feature, so tapping it starts over
    let events = session.handle(InputEvent::Tap { position: on_m }, ms(900), &mut host);
    assert!(events.is_empty());
}

#[test]
fn camera_move_destroys_touch_tooltip() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);

    session.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    session.handle(InputEvent::CameraMoved, ms(100), &mut host);
    assert!(session.tooltip().is_none());
    assert_eq!(session.pending_timers(), 0);

    let events = session.handle(InputEvent::Tap { position: on_m }, ms(200), &mut host);
    assert!(events.is_empty(), "the first tap after a camera move only shows the tooltip");
    assert!(session.tooltip().is_some());
}

#[test]
fn fixed_pointer_mode_treats_taps_as_clicks() {
    let (mut session, mut host) = session(ModeSelection::Fixed(InputMode::Pointer));
    let on_m = host.at(-46.0, -22.2);

    let events = session.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    assert_eq!(open_details(&events), vec![FeatureId::Marker(MARKER_M)]);
    assert_eq!(session.input_mode(), Some(InputMode::Pointer));
}

// ============================================================================
// Refresh and teardown
// ============================================================================

#[test]
fn refresh_aborts_pending_click_on_removed_land() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_p = host.at(-47.75, -22.75);

    session.handle(InputEvent::Click { position: on_p }, ms(0), &mut host);
    session.rebuild(points(), vec![land(LAND_Q, -47.4, -23.0, "Icatu")]);

    assert_eq!(session.state(), InteractionState::Idle);
    assert_eq!(session.pending_timers(), 0);

    // The same pixel now hits nothing
    let events = session.handle(InputEvent::Click { position: on_p }, ms(100), &mut host);
    assert!(events.is_empty());
}

#[test]
fn refresh_aborts_touch_tooltip_on_removed_marker() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);

    session.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    session.rebuild(vec![PointRecord::new(MARKER_N, -22.8, -45.5, "Escola Nhandeva")], lands());

    assert!(session.tooltip().is_none());
    assert_eq!(session.pending_timers(), 0);
    let events = session.handle(InputEvent::TooltipLabelTap, ms(100), &mut host);
    assert!(events.is_empty());
    session.tick(ms(5_000));
}

#[test]
fn refresh_reports_hover_exit_for_removed_marker() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);

    session.handle(InputEvent::PointerMove { position: on_m }, ms(0), &mut host);
    let summary = session.rebuild(points(), lands());
    assert!(summary.events.is_empty(), "surviving hover is kept silently");
    assert_eq!(session.state(), InteractionState::Hovering(FeatureId::Marker(MARKER_M)));

    let summary = session.rebuild(vec![PointRecord::new(MARKER_N, -22.8, -45.5, "Escola Nhandeva")], lands());
    assert_eq!(summary.events, vec![InteractionEvent::HoverExit(FeatureId::Marker(MARKER_M))]);
    assert!(session.tooltip().is_none());
    assert_eq!(session.state(), InteractionState::Idle);
}

#[test]
fn duplicate_land_id_acts_on_first_land_only() {
    let mut session = MapSession::new(SessionConfig::default(), ModeSelection::Auto);
    let summary = session.rebuild(
        points(),
        vec![land(LAND_P, -48.0, -23.0, "Araribá"), land(LAND_P, -46.8, -23.0, "Duplicate")],
    );
    assert_eq!(summary.layer.loaded, 1);
    assert_eq!(summary.layer.dropped.len(), 1);

    let mut host = TestHost::new();
    let on_duplicate = host.at(-46.55, -22.75);
    let events = session.handle(InputEvent::PointerMove { position: on_duplicate }, ms(0), &mut host);
    assert!(events.is_empty());
    session.handle(InputEvent::Click { position: on_duplicate }, ms(16), &mut host);
    assert!(host.fits.is_empty());

    let on_p = host.at(-47.75, -22.75);
    session.handle(InputEvent::Click { position: on_p }, ms(500), &mut host);
    let events = session.handle(InputEvent::Click { position: on_p }, ms(600), &mut host);
    assert_eq!(host.fits.len(), 1);
    assert_eq!(host.fits[0].0.min().x, -48.0);
    match events.as_slice() {
        [InteractionEvent::OpenDetail(detail)] => {
            assert!(matches!(&detail.payload, FeaturePayload::Land(info) if info.name.as_deref() == Some("Araribá")));
        }
        other => panic!("expected one open-detail, got {other:?}"),
    }
}

#[test]
fn refresh_keeps_state_of_surviving_features() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);

    session.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    session.rebuild(points(), lands());

    // The rebuilt marker is highlighted again and the pending tap still completes
    assert!(session.features().marker(MARKER_M).unwrap().hovered);
    let events = session.handle(InputEvent::Tap { position: on_m }, ms(1_000), &mut host);
    assert_eq!(open_details(&events), vec![FeatureId::Marker(MARKER_M)]);
}

#[test]
fn independent_sessions_do_not_share_state() {
    let (mut first, mut host) = session(ModeSelection::Auto);
    let (second, _) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);

    first.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    assert_eq!(first.live_tooltips(), 1);
    assert_eq!(second.live_tooltips(), 0);
    assert_eq!(second.input_mode(), None);
}

#[test]
fn teardown_leaves_no_timers_or_overlays() {
    let (mut session, mut host) = session(ModeSelection::Auto);
    let on_m = host.at(-46.0, -22.2);

    session.handle(InputEvent::Tap { position: on_m }, ms(0), &mut host);
    session.teardown();
    assert_eq!(session.pending_timers(), 0);
    assert_eq!(session.live_tooltips(), 0);
    assert_eq!(session.coordinator().last_tapped(), None);
}
