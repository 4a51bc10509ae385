//! Session configuration

use crate::host::ScreenVec;
use crate::proximity::ProximityThreshold;
use crate::tier::TierTable;
use crate::{MapError, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of one map session
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Markers closer than this are flagged as a nearby pair
    pub proximity_threshold: ProximityThreshold,
    /// Window in which a second click on a land opens its detail
    pub click_disambiguation_timeout: Duration,
    /// Lifetime of a touch tooltip
    pub touch_tooltip_timeout: Duration,
    pub tier_table: TierTable,
    /// Nominal size of an individual marker icon
    pub marker_size_px: u32,
    /// Tooltip offset from its anchor pixel
    pub tooltip_offset: ScreenVec,
    /// Markers closer than this on screen are aggregated into a cluster
    pub cluster_distance_px: f32,
    /// At or above this zoom every marker is drawn on its own
    pub disable_clustering_at_zoom: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: ProximityThreshold::default(),
            click_disambiguation_timeout: Duration::from_millis(300),
            touch_tooltip_timeout: Duration::from_millis(3000),
            tier_table: TierTable::default(),
            marker_size_px: 24,
            tooltip_offset: ScreenVec::new(10.0, -10.0),
            cluster_distance_px: 30.0,
            disable_clustering_at_zoom: 12.0,
        }
    }
}

impl SessionConfig {
    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(MapError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        let degrees = self.proximity_threshold.degrees();
        if !degrees.is_finite() || degrees < 0.0 {
            return invalid("proximity threshold must be a finite, non-negative angle");
        }
        if self.click_disambiguation_timeout.is_zero() {
            return invalid("click disambiguation timeout must be positive");
        }
        if self.touch_tooltip_timeout.is_zero() {
            return invalid("touch tooltip timeout must be positive");
        }
        if self.marker_size_px == 0 {
            return invalid("marker size must be positive");
        }
        if !self.cluster_distance_px.is_finite() || self.cluster_distance_px < 0.0 {
            return invalid("cluster distance must be a finite, non-negative pixel count");
        }
        Ok(())
    }
}
