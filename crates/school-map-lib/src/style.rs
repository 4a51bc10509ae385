//! Marker and polygon style descriptors
//!
//! Descriptors are plain data. The host turns them into draw calls (the viewer paints them with
//! egui shapes) or into an SVG image via [`MarkerIcon::to_svg`]. Building a descriptor is a pure
//! function of its [`IconKey`], which is what makes the LRU memoisation in
//! [`MarkerStyleFactory`] safe.

use crate::geo_layer::LandInfo;
use crate::tier::{FontSpec, TierStyle};
use lru::LruCache;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::hex(0xFFFFFF);

    /// Opaque color from a `0xRRGGBB` literal
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
            a: 0xFF,
        }
    }

    pub const fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `#RRGGBB`, alpha ignored
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// `rgba(r, g, b, a)` with alpha in 0..=1
    pub fn css(&self) -> String {
        format!(
            "rgba({}, {}, {}, {:.2})",
            self.r,
            self.g,
            self.b,
            self.a as f32 / 255.0
        )
    }
}

// Palette
const MARKER_BASE: Rgba = Rgba::hex(0x3B82F6);
const MARKER_BORDER: Rgba = Rgba::hex(0x1E40AF);
const PAIR_BASE: Rgba = Rgba::hex(0xFF6B6B);
const PAIR_BORDER: Rgba = Rgba::hex(0xDC2626);
const LABEL_STROKE: Rgba = Rgba::hex(0x1F2937);

const HOVER_SCALE: f32 = 1.3;
const SELECTED_SCALE: f32 = 1.5;
const NEARBY_PAIR_SCALE: f32 = 1.2;
/// Clusters with more members than this get the glow filter
const GLOW_MIN_COUNT: u32 = 20;

/// Interaction and pairing flags of a single marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MarkerState {
    pub hovered: bool,
    pub selected: bool,
    pub nearby_pair: bool,
}

impl MarkerState {
    /// Display scale: the pair factor times the strongest interaction factor
    pub fn scale(&self) -> f32 {
        let pair = if self.nearby_pair {
            NEARBY_PAIR_SCALE
        } else {
            1.0
        };
        let interaction = if self.selected {
            SELECTED_SCALE
        } else if self.hovered {
            HOVER_SCALE
        } else {
            1.0
        };
        pair * interaction
    }
}

/// Everything an icon descriptor depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IconKey {
    pub base: Rgba,
    pub border: Rgba,
    pub size_px: u32,
    pub state: MarkerState,
    /// Member count and label font for cluster icons
    pub cluster: Option<(u32, FontSpec)>,
}

/// Small corner badge flagging a nearby pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Badge {
    pub color: Rgba,
    pub glyph: char,
}

/// Text drawn over a cluster icon
#[derive(Debug, Clone, PartialEq)]
pub struct IconLabel {
    pub text: String,
    pub font: FontSpec,
    pub fill: Rgba,
    pub stroke: Rgba,
}

/// Drawable icon: a pin with an inner dot plus optional effects
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerIcon {
    /// Nominal size of the square icon box
    pub size_px: u32,
    /// Display scale applied on top of `size_px`
    pub scale: f32,
    pub base_color: Rgba,
    pub border_color: Rgba,
    pub shadow: bool,
    pub gradient: bool,
    pub glow: bool,
    pub badge: Option<Badge>,
    pub label: Option<IconLabel>,
}

impl MarkerIcon {
    /// Build the descriptor for a key. Pure: equal keys give equal icons.
    pub fn from_key(key: &IconKey) -> Self {
        let label = key.cluster.map(|(count, font)| IconLabel {
            text: count.to_string(),
            font,
            fill: Rgba::WHITE,
            stroke: LABEL_STROKE,
        });

        Self {
            size_px: key.size_px,
            scale: key.state.scale(),
            base_color: key.base,
            border_color: key.border,
            shadow: true,
            gradient: true,
            glow: key.cluster.is_some_and(|(count, _)| count > GLOW_MIN_COUNT),
            badge: key.state.nearby_pair.then_some(Badge {
                color: PAIR_BASE,
                glyph: 'P',
            }),
            label,
        }
    }

    /// On-screen diameter in pixels
    pub fn diameter(&self) -> f32 {
        self.size_px as f32 * self.scale
    }

    /// Render the icon as a standalone SVG document at its nominal size
    pub fn to_svg(&self) -> String {
        let size = self.size_px as f32;
        let s = size / 24.0;
        let c = size / 2.0;
        let id = self.size_px;
        let base = self.base_color.to_hex();
        let border = self.border_color.to_hex();

        let mut svg = format!(
            r#"<svg width="{size}" height="{size}" viewBox="0 0 {size} {size}" xmlns="http://www.w3.org/2000/svg"><defs>"#
        );
        if self.shadow {
            svg.push_str(&format!(
                r#"<filter id="shadow-{id}" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="0" dy="{}" stdDeviation="{}" flood-color="rgba(0,0,0,0.3)"/></filter>"#,
                2.0 * s,
                3.0 * s
            ));
        }
        if self.gradient {
            svg.push_str(&format!(
                r#"<linearGradient id="gradient-{id}" x1="0%" y1="0%" x2="100%" y2="100%"><stop offset="0%" stop-color="{base}"/><stop offset="100%" stop-color="{border}"/></linearGradient>"#
            ));
        }
        if self.glow {
            svg.push_str(&format!(
                r#"<filter id="glow-{id}" x="-50%" y="-50%" width="200%" height="200%"><feGaussianBlur stdDeviation="{s}" result="coloredBlur"/><feMerge><feMergeNode in="coloredBlur"/><feMergeNode in="SourceGraphic"/></feMerge></filter>"#
            ));
        }
        svg.push_str("</defs>");

        let fill = if self.gradient {
            format!("url(#gradient-{id})")
        } else {
            base.clone()
        };
        let filter = match (self.glow, self.shadow) {
            (true, _) => format!(r#" filter="url(#glow-{id})""#),
            (false, true) => format!(r#" filter="url(#shadow-{id})""#),
            (false, false) => String::new(),
        };
        svg.push_str(&format!(
            r#"<path d="M{c} {y0}C{x1} {y0} {x2} {y1} {x2} {y2}c0 {d1} {d2} {d3} {d2} {d3}s{d2} -{d4} {d2} -{d3}c0 -{d5} -{d6} -{d2} -{d2} -{d2}z" fill="{fill}"{filter}/>"#,
            y0 = 2.0 * s,
            x1 = c - 3.87 * s,
            x2 = c - 7.0 * s,
            y1 = 5.13 * s,
            y2 = 9.0 * s,
            d1 = 5.25 * s,
            d2 = 7.0 * s,
            d3 = 13.0 * s,
            d4 = 7.75 * s,
            d5 = 3.87 * s,
            d6 = 3.13 * s,
        ));

        // Inner dot and its highlight
        svg.push_str(&format!(
            r#"<circle cx="{c}" cy="{}" r="{}" fill="white" opacity="0.9"/><circle cx="{}" cy="{}" r="{}" fill="white" opacity="0.4"/>"#,
            9.0 * s,
            3.0 * s,
            c - 2.0 * s,
            7.0 * s,
            1.8 * s
        ));

        if let Some(badge) = &self.badge {
            let bx = size - 4.0 * s;
            svg.push_str(&format!(
                r#"<circle cx="{bx}" cy="{}" r="{}" fill="{}" opacity="0.8"/><text x="{bx}" y="{}" text-anchor="middle" font-size="{}" fill="white" font-weight="bold">{}</text>"#,
                4.0 * s,
                3.0 * s,
                badge.color.to_hex(),
                6.0 * s,
                8.0 * s,
                badge.glyph
            ));
        }

        if let Some(label) = &self.label {
            svg.push_str(&format!(
                r#"<text x="{c}" y="{c}" text-anchor="middle" dominant-baseline="middle" font-size="{}" font-weight="{}" fill="{}" stroke="{}" stroke-width="1">{}</text>"#,
                label.font.size_px,
                if label.font.bold { "bold" } else { "normal" },
                label.fill.to_hex(),
                label.stroke.to_hex(),
                label.text
            ));
        }

        svg.push_str("</svg>");
        svg
    }
}

/// Memoising factory for marker and cluster icons
pub struct MarkerStyleFactory {
    cache: LruCache<IconKey, Arc<MarkerIcon>>,
    marker_size_px: u32,
    hits: u64,
    misses: u64,
}

impl MarkerStyleFactory {
    /// Icons differ only by a handful of flags and tiers, so a small cache covers every key
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(marker_size_px: u32) -> Self {
        Self::with_capacity(marker_size_px, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(marker_size_px: u32, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            marker_size_px,
            hits: 0,
            misses: 0,
        }
    }

    /// Icon for a single marker
    pub fn marker_icon(&mut self, state: MarkerState) -> Arc<MarkerIcon> {
        let (base, border) = if state.nearby_pair {
            (PAIR_BASE, PAIR_BORDER)
        } else {
            (MARKER_BASE, MARKER_BORDER)
        };
        self.icon(IconKey {
            base,
            border,
            size_px: self.marker_size_px,
            state,
            cluster: None,
        })
    }

    /// Icon for a cluster of `count` markers in the given tier
    pub fn cluster_icon(&mut self, count: usize, tier: &TierStyle) -> Arc<MarkerIcon> {
        self.icon(IconKey {
            base: tier.color,
            border: tier.color,
            size_px: tier.pixel_diameter,
            state: MarkerState::default(),
            cluster: Some((count.min(u32::MAX as usize) as u32, tier.font)),
        })
    }

    pub fn icon(&mut self, key: IconKey) -> Arc<MarkerIcon> {
        if let Some(icon) = self.cache.get(&key) {
            self.hits += 1;
            return Arc::clone(icon);
        }
        self.misses += 1;
        let icon = Arc::new(MarkerIcon::from_key(&key));
        self.cache.put(key, Arc::clone(&icon));
        icon
    }

    /// (hits, misses) since creation
    pub fn cache_stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn marker_size_px(&self) -> u32 {
        self.marker_size_px
    }
}

/// Fill and stroke of a land polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandStyle {
    pub fill: Rgba,
    pub stroke: Rgba,
    pub stroke_width: f32,
    /// Dash pattern (on, off) in pixels
    pub dash: [f32; 2],
}

/// Style for a land polygon; regularized lands are drawn with a stronger fill
pub fn land_style(info: &LandInfo, hovered: bool) -> LandStyle {
    let fill = if info.is_regularized() {
        Rgba::from_rgba(220, 20, 60, 77)
    } else {
        Rgba::from_rgba(139, 0, 0, 64)
    };
    LandStyle {
        fill,
        stroke: Rgba::hex(0xB22222),
        stroke_width: if hovered { 3.0 } else { 2.0 },
        dash: [3.0, 3.0],
    }
}
