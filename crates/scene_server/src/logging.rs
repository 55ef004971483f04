//! Logging system setup and configuration.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] (so
//! `RUST_LOG` wins over the configured level), a human-readable or JSON
//! console layer, and an optional plain-text file layer.

use crate::config::LoggingSettings;
use crate::error::ServerError;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global subscriber. `json_format` forces JSON output
/// regardless of the settings.
///
/// Fails if a global subscriber is already installed or the log file
/// cannot be opened.
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<(), ServerError> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let file_layer = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    let installed = if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    };
    installed.map_err(|e| ServerError::Logging(e.to_string()))?;

    info!("🔧 Logging initialized with level: {}", log_level);
    if let Some(path) = &config.file_path {
        info!("📝 Also logging to {}", path);
    }
    Ok(())
}

/// Displays the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🌐 SCENE SERVER 🌐            ║");
    info!("║                 v{}                   ║", version);
    info!("║                                          ║");
    info!("║  Interest-Managed Event Dissemination    ║");
    info!("║                                          ║");
    info!("║  🎯 Per-Presence Priorities              ║");
    info!("║  🧩 Coalesced Updates                    ║");
    info!("║  ⏱️  Budgeted Heartbeat Drains            ║");
    info!("║                                          ║");
    info!("╚══════════════════════════════════════════╝");
}
