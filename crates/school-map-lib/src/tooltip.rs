//! The single transient tooltip of a map session

use crate::feature::FeatureId;
use crate::host::{MapHost, ScreenPos, ScreenVec};
use crate::timer::{TimerHandle, TimerQueue};
use geo::Coord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooltipContent {
    pub text: String,
    /// Touch tooltips: tapping the label opens the detail directly
    pub tappable: bool,
}

/// A mounted tooltip
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipOverlay {
    pub anchor_feature: FeatureId,
    /// Geographic anchor (lon/lat)
    pub anchor: Coord<f64>,
    /// Top-left of the overlay, anchor pixel plus the configured offset
    pub screen_position: ScreenPos,
    pub content: TooltipContent,
    pub dismiss_timer: Option<TimerHandle>,
}

/// Owns the at-most-one live [`TooltipOverlay`]
///
/// Overlays are never repositioned after a camera move; the session destroys them instead.
#[derive(Debug)]
pub struct TooltipOverlayManager {
    current: Option<TooltipOverlay>,
    offset: ScreenVec,
}

impl TooltipOverlayManager {
    pub fn new(offset: ScreenVec) -> Self {
        Self {
            current: None,
            offset,
        }
    }

    /// Mount an overlay for `feature` at `anchor`, destroying any overlay already alive
    pub fn create_overlay(
        &mut self,
        feature: FeatureId,
        anchor: Coord<f64>,
        content: TooltipContent,
        host: &dyn MapHost,
        timers: &mut TimerQueue,
    ) -> &TooltipOverlay {
        self.destroy_overlay(timers);
        debug_assert!(self.current.is_none(), "tooltip overlay leaked");

        let screen_position = host.project(anchor).offset(self.offset);
        tracing::trace!("Tooltip for {feature:?} at {screen_position:?}");

        self.current.insert(TooltipOverlay {
            anchor_feature: feature,
            anchor,
            screen_position,
            content,
            dismiss_timer: None,
        })
    }

    /// Detach the overlay and cancel its dismiss timer. Safe to call with nothing mounted.
    pub fn destroy_overlay(&mut self, timers: &mut TimerQueue) -> bool {
        let Some(overlay) = self.current.take() else {
            return false;
        };
        if let Some(timer) = overlay.dismiss_timer {
            timers.cancel(timer);
        }
        tracing::trace!("Tooltip for {:?} destroyed", overlay.anchor_feature);
        true
    }

    /// Tie a dismiss timer to the live overlay; cancels the timer if nothing is mounted
    pub fn attach_dismiss_timer(&mut self, timer: TimerHandle, timers: &mut TimerQueue) {
        match self.current.as_mut() {
            Some(overlay) => {
                if let Some(previous) = overlay.dismiss_timer.replace(timer) {
                    timers.cancel(previous);
                }
            }
            None => {
                timers.cancel(timer);
            }
        }
    }

    /// Follow the pointer while it stays over the same feature
    pub fn move_anchor(&mut self, anchor: Coord<f64>, host: &dyn MapHost) {
        if let Some(overlay) = self.current.as_mut() {
            overlay.anchor = anchor;
            overlay.screen_position = host.project(anchor).offset(self.offset);
        }
    }

    pub fn current(&self) -> Option<&TooltipOverlay> {
        self.current.as_ref()
    }

    pub fn is_showing(&self, feature: FeatureId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|overlay| overlay.anchor_feature == feature)
    }

    /// Number of mounted overlays, 0 or 1
    pub fn live_count(&self) -> usize {
        usize::from(self.current.is_some())
    }
}
