//! Cluster classification: aggregate count to visual tier

use crate::style::Rgba;
use crate::{MapError, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Visual size bucket of a cluster, ordered from smallest to largest
///
/// The value is the tier's position in its [`TierTable`], so custom tables with more or fewer
/// buckets keep the ordering guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterTier(pub u8);

impl ClusterTier {
    pub const SMALL: ClusterTier = ClusterTier(0);
    pub const MEDIUM: ClusterTier = ClusterTier(1);
    pub const LARGE: ClusterTier = ClusterTier(2);
    pub const XLARGE: ClusterTier = ClusterTier(3);
    pub const XXLARGE: ClusterTier = ClusterTier(4);
}

/// Font used for the count label of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FontSpec {
    pub size_px: u16,
    pub bold: bool,
}

impl FontSpec {
    pub const fn bold(size_px: u16) -> Self {
        Self {
            size_px,
            bold: true,
        }
    }

    /// CSS shorthand, e.g. `bold 14px Arial`
    pub fn css(&self) -> String {
        if self.bold {
            format!("bold {}px Arial", self.size_px)
        } else {
            format!("{}px Arial", self.size_px)
        }
    }
}

/// One row of the tier table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TierStyle {
    pub name: String,
    /// Largest count in this tier, `None` for the open-ended last row
    pub max_count: Option<usize>,
    pub pixel_diameter: u32,
    pub font: FontSpec,
    pub color: Rgba,
}

/// What an aggregate of `count` markers renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// A single marker: drawn as a plain marker, never as a cluster icon
    Single,
    Cluster(ClusterTier),
}

/// Ordered list of tiers, validated on construction
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<TierStyle>", into = "Vec<TierStyle>"))]
pub struct TierTable {
    rows: Vec<TierStyle>,
}

impl TierTable {
    /// Build a table from rows ordered by `max_count`
    ///
    /// Rows must have strictly increasing `max_count` starting at 2 or more, only the last row
    /// may be open-ended, and diameters may not shrink. Those rules are what make
    /// [`TierTable::classify`] monotonic.
    pub fn new(rows: Vec<TierStyle>) -> Result<Self> {
        let invalid = |reason: String| Err(MapError::InvalidConfig { reason });

        if rows.is_empty() {
            return invalid("tier table is empty".into());
        }
        if rows.len() > u8::MAX as usize {
            return invalid(format!("tier table has {} rows", rows.len()));
        }

        let mut previous_max = 1usize;
        let mut previous_diameter = 0u32;
        for (index, row) in rows.iter().enumerate() {
            let is_last = index + 1 == rows.len();
            match row.max_count {
                Some(max) if max <= previous_max => {
                    return invalid(format!(
                        "tier '{}' max_count {max} does not exceed {previous_max}",
                        row.name
                    ));
                }
                Some(max) => previous_max = max,
                None if !is_last => {
                    return invalid(format!("tier '{}' is open-ended but not last", row.name));
                }
                None => {}
            }
            if row.pixel_diameter < previous_diameter {
                return invalid(format!("tier '{}' shrinks the cluster diameter", row.name));
            }
            previous_diameter = row.pixel_diameter;
        }

        Ok(Self { rows })
    }

    /// Classify an aggregate count
    ///
    /// Counts of 0 or 1 are [`Aggregate::Single`]. Counts beyond the last bounded row fall into
    /// the last row.
    pub fn classify(&self, count: usize) -> Aggregate {
        if count <= 1 {
            return Aggregate::Single;
        }

        let index = self
            .rows
            .iter()
            .position(|row| row.max_count.is_none_or(|max| count <= max))
            .unwrap_or(self.rows.len() - 1);

        Aggregate::Cluster(ClusterTier(index as u8))
    }

    pub fn style(&self, tier: ClusterTier) -> &TierStyle {
        let index = (tier.0 as usize).min(self.rows.len() - 1);
        &self.rows[index]
    }

    pub fn rows(&self) -> &[TierStyle] {
        &self.rows
    }
}

impl Default for TierTable {
    fn default() -> Self {
        let row = |name: &str, max_count, pixel_diameter, font_px, color| TierStyle {
            name: name.to_string(),
            max_count,
            pixel_diameter,
            font: FontSpec::bold(font_px),
            color,
        };

        Self {
            rows: vec![
                row("small", Some(10), 50, 14, Rgba::hex(0x60A5FA)),
                row("medium", Some(20), 52, 15, Rgba::hex(0x3B82F6)),
                row("large", Some(50), 56, 16, Rgba::hex(0x2563EB)),
                row("xlarge", Some(100), 64, 18, Rgba::hex(0x1E40AF)),
                row("xxlarge", None, 72, 18, Rgba::hex(0x1E40AF)),
            ],
        }
    }
}

impl TryFrom<Vec<TierStyle>> for TierTable {
    type Error = MapError;

    fn try_from(rows: Vec<TierStyle>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<TierTable> for Vec<TierStyle> {
    fn from(table: TierTable) -> Self {
        table.rows
    }
}
