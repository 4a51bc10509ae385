//! School Map Viewer - Application Library
//!
//! Desktop host for `school-map-lib`: a walkers slippy map that draws the session's lands,
//! markers and clusters and forwards pointer and touch input to it.

mod app;

pub use app::SchoolMapApp;

const APP_NAME: &str = "School Map Viewer";

/// Filter used when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = if cfg!(debug_assertions) {
    "debug,eframe::native=warn,walkers=info,egui::context=warn,reqwest::connect=info"
} else {
    "info,eframe::native=warn,egui::context=warn"
};

/// Install the tracing subscriber; must run before anything logs
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let fmt_layer = fmt::layer().with_filter(filter);

    if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
        eprintln!("A tracing subscriber was already installed");
    }
}

/// Run the native application until its window closes
pub fn native_main() -> eframe::Result {
    setup_logging();
    tracing::info!("Starting {APP_NAME} v{}", env!("CARGO_PKG_VERSION"));

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(APP_NAME),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(|cc| Ok(Box::new(SchoolMapApp::new(cc)))),
    )
}
