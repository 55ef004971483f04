//! # Scene Server - Main Entry Point
//!
//! Hosts one interest-managed scene: loads configuration, installs the
//! default feature modules, runs the drain scheduler and a health monitor,
//! optionally drives synthetic load, and shuts down gracefully on signal.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (writes scene.toml if missing)
//! scene_server
//!
//! # Specify custom configuration
//! scene_server --config harbour.toml
//!
//! # Faster heartbeat, verbose logs, 50 synthetic presences
//! scene_server --heartbeat-ms 250 --log-level debug --simulate 50
//!
//! # JSON logging for production
//! scene_server --json-logs
//! ```
//!
//! ## Signal Handling
//!
//! The first SIGINT/SIGTERM starts a phased shutdown: producers stop, the
//! scheduler finishes its current drain, everything still pending is
//! flushed, then presences leave. A second signal exits immediately.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod signals;
pub mod simulation;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

pub use app::{RunningApplication, ShutdownSummary};
pub use config::{LoggingSettings, RegionSettings, ServerSettings, SimulationSettings};
pub use error::ServerError;
pub use simulation::SimulationReport;

/// Parses the command line, sets up logging and runs the application until
/// shutdown.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging settings come from the file; a broken file falls back to
    // defaults here and is reported properly by `Application::new`.
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    config.apply_cli_overrides(&args);

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}
