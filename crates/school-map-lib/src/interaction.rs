//! Interaction state machine
//!
//! Raw input from the host is turned into semantic events here. Two strategies exist, pointer
//! and touch, and exactly one of them is active for a session:
//!
//! - **Pointer**: hovering a feature highlights it and shows a tooltip at the pointer. A click on
//!   a marker opens its detail at once. The first click on a land fits the camera to it and opens
//!   a disambiguation window; a second click on the same land inside the window opens the detail.
//! - **Touch**: the first tap on a feature shows a tappable tooltip with its name for a while. A
//!   second tap on the same feature, or a tap on the tooltip label, opens the detail.
//!
//! Clusters never open a detail in either mode; they zoom the camera onto their members.
//!
//! Every emission is preceded by an existence check against the current [`FeatureSet`], so a
//! refresh that removes a feature mid-interaction can never leak an event for it.

use crate::cluster::cluster_fit_zoom;
use crate::config::SessionConfig;
use crate::feature::{DetailPayload, FeatureId, FeatureKind, FeatureSet, PickTarget};
use crate::host::{MapHost, ScreenPos};
use crate::timer::{FiredTimer, TimerHandle, TimerKind, TimerQueue};
use crate::tooltip::{TooltipContent, TooltipOverlayManager};
use geo::Rect;
use std::time::Duration;

/// Raw input as reported by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove { position: ScreenPos },
    /// The pointer left the map widget
    PointerLeave,
    Click { position: ScreenPos },
    Tap { position: ScreenPos },
    /// Tap on the label of the live (touch) tooltip
    TooltipLabelTap,
    /// The camera was panned or zoomed
    CameraMoved,
}

impl InputEvent {
    pub fn position(&self) -> Option<ScreenPos> {
        match self {
            InputEvent::PointerMove { position }
            | InputEvent::Click { position }
            | InputEvent::Tap { position } => Some(*position),
            _ => None,
        }
    }

    /// Modality implied by the event, if any
    fn modality(&self) -> Option<InputMode> {
        match self {
            InputEvent::PointerMove { .. } | InputEvent::PointerLeave | InputEvent::Click { .. } => {
                Some(InputMode::Pointer)
            }
            InputEvent::Tap { .. } | InputEvent::TooltipLabelTap => Some(InputMode::Touch),
            InputEvent::CameraMoved => None,
        }
    }
}

/// Semantic events for the detail panel and telemetry
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    HoverEnter(FeatureId),
    HoverExit(FeatureId),
    OpenDetail(DetailPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Hovering(FeatureId),
    AwaitingSecondClick { feature: FeatureId, timer: TimerHandle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputMode {
    Pointer,
    Touch,
}

/// How the input strategy of a session is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModeSelection {
    /// Locked by the first event that implies a modality
    #[default]
    Auto,
    Fixed(InputMode),
}

/// Session state the coordinator acts on
pub(crate) struct Resources<'a> {
    pub features: &'a mut FeatureSet,
    pub tooltip: &'a mut TooltipOverlayManager,
    pub timers: &'a mut TimerQueue,
    pub host: &'a mut dyn MapHost,
    pub config: &'a SessionConfig,
    /// Time of the event being handled
    pub now: Duration,
}

#[derive(Debug)]
pub struct InteractionCoordinator {
    selection: ModeSelection,
    mode: Option<InputMode>,
    /// Pointer mode: feature under the pointer
    hovered: Option<FeatureId>,
    /// Pointer mode: land waiting for its second click
    pending_click: Option<(FeatureId, TimerHandle)>,
    /// Touch mode: feature whose tooltip is showing, with the dismiss timer
    last_tapped: Option<(FeatureId, TimerHandle)>,
    /// Feature whose detail was opened last
    selected: Option<FeatureId>,
}

impl InteractionCoordinator {
    pub fn new(selection: ModeSelection) -> Self {
        Self {
            selection,
            mode: match selection {
                ModeSelection::Auto => None,
                ModeSelection::Fixed(mode) => Some(mode),
            },
            hovered: None,
            pending_click: None,
            last_tapped: None,
            selected: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        if let Some((feature, timer)) = self.pending_click {
            InteractionState::AwaitingSecondClick { feature, timer }
        } else if let Some(feature) = self.hovered {
            InteractionState::Hovering(feature)
        } else {
            InteractionState::Idle
        }
    }

    /// Active strategy, `None` until the first modal event under [`ModeSelection::Auto`]
    pub fn mode(&self) -> Option<InputMode> {
        self.mode
    }

    pub fn selection(&self) -> ModeSelection {
        self.selection
    }

    pub fn hovered(&self) -> Option<FeatureId> {
        self.hovered
    }

    pub fn last_tapped(&self) -> Option<FeatureId> {
        self.last_tapped.map(|(feature, _)| feature)
    }

    pub fn selected(&self) -> Option<FeatureId> {
        self.selected
    }

    fn lock_mode(&mut self, event: &InputEvent) -> Option<InputMode> {
        if self.mode.is_none()
            && let Some(mode) = event.modality()
        {
            tracing::debug!("Input mode locked to {mode:?}");
            self.mode = Some(mode);
        }
        self.mode
    }

    /// Feed one input event; `target` is what lies under the event position
    pub(crate) fn handle(
        &mut self,
        event: InputEvent,
        target: Option<PickTarget>,
        res: &mut Resources<'_>,
    ) -> Vec<InteractionEvent> {
        let mut out = Vec::new();

        if event == InputEvent::CameraMoved {
            self.on_camera_moved(res);
            return out;
        }

        let Some(mode) = self.lock_mode(&event) else {
            return out;
        };
        tracing::trace!("{event:?} on {target:?} ({mode:?})");

        match mode {
            InputMode::Pointer => self.handle_pointer(event, target, res, &mut out),
            InputMode::Touch => self.handle_touch(event, target, res, &mut out),
        }
        out
    }

    fn handle_pointer(
        &mut self,
        event: InputEvent,
        target: Option<PickTarget>,
        res: &mut Resources<'_>,
        out: &mut Vec<InteractionEvent>,
    ) {
        match event {
            InputEvent::PointerMove { position } => {
                let feature = match target {
                    Some(PickTarget::Feature(feature)) => Some(feature),
                    _ => None,
                };
                self.update_hover(feature, position, res, out);
            }
            InputEvent::PointerLeave => self.update_hover(None, ScreenPos::default(), res, out),
            // A fixed pointer strategy treats taps as clicks
            InputEvent::Click { .. } | InputEvent::Tap { .. } => self.pointer_click(target, res, out),
            InputEvent::TooltipLabelTap | InputEvent::CameraMoved => {}
        }
    }

    fn update_hover(
        &mut self,
        feature: Option<FeatureId>,
        position: ScreenPos,
        res: &mut Resources<'_>,
        out: &mut Vec<InteractionEvent>,
    ) {
        if feature.is_some() && feature == self.hovered {
            let anchor = res.host.unproject(position);
            match feature {
                Some(f) if res.tooltip.is_showing(f) => res.tooltip.move_anchor(anchor, res.host),
                Some(f) => self.show_hover_tooltip(f, position, res),
                None => {}
            }
            return;
        }

        if let Some(previous) = self.hovered.take() {
            res.features.set_hovered(previous, false);
            if res.tooltip.is_showing(previous) {
                res.tooltip.destroy_overlay(res.timers);
            }
            out.push(InteractionEvent::HoverExit(previous));
        }

        let Some(feature) = feature else {
            return;
        };
        if !res.features.set_hovered(feature, true) {
            return;
        }
        self.hovered = Some(feature);
        out.push(InteractionEvent::HoverEnter(feature));
        self.show_hover_tooltip(feature, position, res);
    }

    fn show_hover_tooltip(&self, feature: FeatureId, position: ScreenPos, res: &mut Resources<'_>) {
        let Some(text) = res.features.tooltip_text(feature) else {
            return;
        };
        let anchor = res.host.unproject(position);
        res.tooltip.create_overlay(
            feature,
            anchor,
            TooltipContent {
                text,
                tappable: false,
            },
            res.host,
            res.timers,
        );
    }

    fn pointer_click(
        &mut self,
        target: Option<PickTarget>,
        res: &mut Resources<'_>,
        out: &mut Vec<InteractionEvent>,
    ) {
        match target {
            Some(PickTarget::Feature(feature)) => match feature.kind() {
                FeatureKind::Marker => {
                    self.cancel_pending_click(res.timers);
                    self.emit_open_detail(feature, res, out);
                }
                FeatureKind::Land => self.land_click(feature, res, out),
            },
            Some(PickTarget::Cluster { count, extent }) => {
                self.cancel_pending_click(res.timers);
                zoom_to_cluster(count, extent, res.host);
            }
            None => self.cancel_pending_click(res.timers),
        }
    }

    fn land_click(&mut self, land: FeatureId, res: &mut Resources<'_>, out: &mut Vec<InteractionEvent>) {
        if let Some((pending, timer)) = self.pending_click
            && pending == land
            && res.timers.is_pending(timer)
        {
            self.cancel_pending_click(res.timers);
            self.emit_open_detail(land, res, out);
            return;
        }

        // Any other click supersedes the pending one
        self.cancel_pending_click(res.timers);

        let Some(extent) = res.features.extent(land) else {
            return;
        };
        res.host.fit_extent(extent, None);

        let timer = res.timers.schedule(
            TimerKind::ClickDisambiguation,
            land,
            res.now,
            res.config.click_disambiguation_timeout,
        );
        self.pending_click = Some((land, timer));
        tracing::trace!("Awaiting second click on {land:?}");
    }

    fn cancel_pending_click(&mut self, timers: &mut TimerQueue) {
        if let Some((_, timer)) = self.pending_click.take() {
            timers.cancel(timer);
        }
    }

    fn handle_touch(
        &mut self,
        event: InputEvent,
        target: Option<PickTarget>,
        res: &mut Resources<'_>,
        out: &mut Vec<InteractionEvent>,
    ) {
        match event {
            // A fixed touch strategy treats clicks as taps and has no hover
            InputEvent::Tap { position } | InputEvent::Click { position } => {
                self.tap(target, position, res, out)
            }
            InputEvent::TooltipLabelTap => {
                if let Some((feature, _)) = self.last_tapped {
                    self.dismiss_touch_tooltip(res);
                    self.emit_open_detail(feature, res, out);
                }
            }
            InputEvent::PointerMove { .. } | InputEvent::PointerLeave | InputEvent::CameraMoved => {}
        }
    }

    fn tap(
        &mut self,
        target: Option<PickTarget>,
        position: ScreenPos,
        res: &mut Resources<'_>,
        out: &mut Vec<InteractionEvent>,
    ) {
        match target {
            Some(PickTarget::Feature(feature)) => {
                if let Some((last, timer)) = self.last_tapped
                    && last == feature
                    && res.timers.is_pending(timer)
                {
                    self.dismiss_touch_tooltip(res);
                    self.emit_open_detail(feature, res, out);
                    return;
                }

                self.dismiss_touch_tooltip(res);
                let Some(text) = res.features.tooltip_text(feature) else {
                    return;
                };
                let anchor = res.host.unproject(position);
                res.tooltip.create_overlay(
                    feature,
                    anchor,
                    TooltipContent {
                        text,
                        tappable: true,
                    },
                    res.host,
                    res.timers,
                );
                let timer = res.timers.schedule(
                    TimerKind::TooltipDismiss,
                    feature,
                    res.now,
                    res.config.touch_tooltip_timeout,
                );
                res.tooltip.attach_dismiss_timer(timer, res.timers);
                res.features.set_hovered(feature, true);
                self.last_tapped = Some((feature, timer));
            }
            Some(PickTarget::Cluster { count, extent }) => {
                self.dismiss_touch_tooltip(res);
                zoom_to_cluster(count, extent, res.host);
            }
            None => self.dismiss_touch_tooltip(res),
        }
    }

    /// Remove the touch tooltip, its timer and the highlight of its feature
    fn dismiss_touch_tooltip(&mut self, res: &mut Resources<'_>) {
        if let Some((feature, timer)) = self.last_tapped.take() {
            res.timers.cancel(timer);
            res.features.set_hovered(feature, false);
        }
        res.tooltip.destroy_overlay(res.timers);
    }

    fn on_camera_moved(&mut self, res: &mut Resources<'_>) {
        if let Some((feature, timer)) = self.last_tapped.take() {
            res.timers.cancel(timer);
            res.features.set_hovered(feature, false);
        }
        res.tooltip.destroy_overlay(res.timers);
    }

    fn emit_open_detail(&mut self, feature: FeatureId, res: &mut Resources<'_>, out: &mut Vec<InteractionEvent>) {
        let Some(payload) = res.features.payload(feature) else {
            tracing::debug!("Dropping open-detail for vanished {feature:?}");
            if res.tooltip.is_showing(feature) {
                res.tooltip.destroy_overlay(res.timers);
            }
            return;
        };

        if let Some(previous) = self.selected.replace(feature) {
            res.features.set_selected(previous, false);
        }
        res.features.set_selected(feature, true);

        tracing::debug!("Open detail for {feature:?}");
        out.push(InteractionEvent::OpenDetail(payload));
    }

    /// Apply expired timers. Expiry never emits.
    pub(crate) fn on_timers(
        &mut self,
        fired: &[FiredTimer],
        features: &mut FeatureSet,
        tooltip: &mut TooltipOverlayManager,
        timers: &mut TimerQueue,
    ) {
        for timer in fired {
            match timer.kind {
                TimerKind::ClickDisambiguation => {
                    if self.pending_click.is_some_and(|(_, handle)| handle == timer.handle) {
                        tracing::trace!("Click window for {:?} expired", timer.feature);
                        self.pending_click = None;
                    }
                }
                TimerKind::TooltipDismiss => {
                    if self.last_tapped.is_some_and(|(_, handle)| handle == timer.handle) {
                        tracing::trace!("Tooltip for {:?} expired", timer.feature);
                        self.last_tapped = None;
                        features.set_hovered(timer.feature, false);
                        tooltip.destroy_overlay(timers);
                    }
                }
            }
        }
    }

    /// Reconcile with a rebuilt feature set
    ///
    /// State referring to features that no longer exist is dropped with its timers and tooltip.
    /// Flags of surviving features are applied again, since the rebuild recreated them. Returns a
    /// `HoverExit` when the hovered feature vanished.
    pub(crate) fn on_refresh(
        &mut self,
        features: &mut FeatureSet,
        tooltip: &mut TooltipOverlayManager,
        timers: &mut TimerQueue,
    ) -> Vec<InteractionEvent> {
        let mut out = Vec::new();

        if let Some(overlay) = tooltip.current()
            && !features.contains(overlay.anchor_feature)
        {
            tooltip.destroy_overlay(timers);
        }

        if let Some((feature, timer)) = self.pending_click
            && !features.contains(feature)
        {
            tracing::debug!("Pending click on {feature:?} aborted by refresh");
            timers.cancel(timer);
            self.pending_click = None;
        }

        if let Some((feature, timer)) = self.last_tapped {
            if features.contains(feature) {
                features.set_hovered(feature, true);
            } else {
                tracing::debug!("Tooltip for {feature:?} aborted by refresh");
                timers.cancel(timer);
                self.last_tapped = None;
            }
        }

        if let Some(feature) = self.hovered
            && !features.set_hovered(feature, true)
        {
            tracing::debug!("Hovered {feature:?} removed by refresh");
            self.hovered = None;
            out.push(InteractionEvent::HoverExit(feature));
        }

        if let Some(feature) = self.selected
            && !features.set_selected(feature, true)
        {
            self.selected = None;
        }
        out
    }

    /// Forget the current selection, e.g. when the detail panel is closed
    pub(crate) fn clear_selection(&mut self, features: &mut FeatureSet) {
        if let Some(feature) = self.selected.take() {
            features.set_selected(feature, false);
        }
    }

    /// Cancel every timer and overlay; the mode lock survives
    pub(crate) fn teardown(
        &mut self,
        features: &mut FeatureSet,
        tooltip: &mut TooltipOverlayManager,
        timers: &mut TimerQueue,
    ) {
        self.cancel_pending_click(timers);
        if let Some((_, timer)) = self.last_tapped.take() {
            timers.cancel(timer);
        }
        tooltip.destroy_overlay(timers);
        self.hovered = None;
        self.selected = None;
        features.clear_flags();
        tracing::debug!("Interaction state torn down");
    }
}

fn zoom_to_cluster(count: usize, extent: Rect<f64>, host: &mut dyn MapHost) {
    let max_zoom = cluster_fit_zoom(count, host.zoom());
    tracing::trace!("Zooming onto cluster of {count} (max zoom {max_zoom})");
    host.fit_extent(extent, Some(max_zoom));
}
