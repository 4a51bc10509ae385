use clap::{Parser, ValueEnum};
use school_map_lib::{InputMode, ModeSelection, ProximityThreshold, SessionConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// School Map Viewer - Indigenous schools and indigenous lands on a slippy map
pub struct Settings {
    /// JSON array of school records
    #[clap(short, long, value_name = "FILE")]
    pub points: Option<PathBuf>,

    /// GeoJSON FeatureCollection of land polygons
    #[clap(short, long, value_name = "FILE")]
    pub lands: Option<PathBuf>,

    /// Input strategy; `auto` locks to the first pointer or touch event
    #[clap(long, value_enum, default_value = "auto")]
    pub input: InputArg,

    /// Window in milliseconds for a second click on a land to open its detail
    #[clap(long, default_value = "300")]
    pub click_timeout_ms: u64,

    /// Milliseconds before a touch tooltip dismisses itself
    #[clap(long, default_value = "3000")]
    pub touch_tooltip_ms: u64,

    /// Maximum angular distance in degrees between two schools flagged as a nearby pair
    #[clap(long, default_value = "0.00005")]
    pub pair_threshold: f64,

    /// Pixel distance under which markers are aggregated into a cluster
    #[clap(long, default_value = "30.0")]
    pub cluster_distance: f32,

    /// Draw school names next to their markers once zoomed in
    #[clap(long, default_value = "false")]
    pub show_names: bool,

    /// Ignore previously persisted UI state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputArg {
    Auto,
    Pointer,
    Touch,
}

impl Settings {
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    pub fn mode_selection(&self) -> ModeSelection {
        match self.input {
            InputArg::Auto => ModeSelection::Auto,
            InputArg::Pointer => ModeSelection::Fixed(InputMode::Pointer),
            InputArg::Touch => ModeSelection::Fixed(InputMode::Touch),
        }
    }

    /// Engine configuration with the CLI overrides applied
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            proximity_threshold: ProximityThreshold::from_degrees(self.pair_threshold),
            click_disambiguation_timeout: Duration::from_millis(self.click_timeout_ms),
            touch_tooltip_timeout: Duration::from_millis(self.touch_tooltip_ms),
            cluster_distance_px: self.cluster_distance,
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let settings = Settings::parse_from(["school-map-viewer"]);
        assert_eq!(settings.mode_selection(), ModeSelection::Auto);
        assert_eq!(settings.session_config(), SessionConfig::default());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::parse_from([
            "school-map-viewer",
            "--input",
            "touch",
            "--click-timeout-ms",
            "450",
            "--points",
            "escolas.json",
        ]);
        assert_eq!(settings.mode_selection(), ModeSelection::Fixed(InputMode::Touch));
        assert_eq!(
            settings.session_config().click_disambiguation_timeout,
            Duration::from_millis(450)
        );
        assert_eq!(settings.points, Some(PathBuf::from("escolas.json")));
        assert!(settings.session_config().validate().is_ok());
    }
}
