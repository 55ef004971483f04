//! Configuration management for the scene server.
//!
//! This module handles loading, overriding and validation of the server
//! configuration. The engine and scheduler sections deserialize straight
//! into [`EngineConfig`] and [`SchedulerConfig`], so the file speaks the
//! same vocabulary as the library crates.

use crate::cli::CliArgs;
use crate::error::ServerError;
use interest_engine::{EngineConfig, SchedulerConfig, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scene identity, bounds and admission limit
    #[serde(default)]
    pub server: ServerSettings,
    /// Interest engine tunables
    #[serde(default)]
    pub engine: EngineConfig,
    /// Heartbeat drain settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Synthetic load driver
    #[serde(default)]
    pub simulation: SimulationSettings,
}

/// Scene-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Name the scene is created under; shows up in every scene log line
    #[serde(default = "default_scene_name")]
    pub scene_name: String,
    /// Spatial region boundaries for this scene
    #[serde(default)]
    pub region: RegionSettings,
    /// Maximum number of presences admitted at once
    #[serde(default = "default_max_presences")]
    pub max_presences: usize,
}

fn default_scene_name() -> String {
    "region".to_string()
}

fn default_max_presences() -> usize {
    100
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            scene_name: default_scene_name(),
            region: RegionSettings::default(),
            max_presences: default_max_presences(),
        }
    }
}

/// Spatial region boundary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            max_x: 256.0,
            min_y: 0.0,
            max_y: 256.0,
            min_z: 0.0,
            max_z: 4096.0,
        }
    }
}

impl RegionSettings {
    pub fn contains(&self, position: Vec3) -> bool {
        (self.min_x..=self.max_x).contains(&position.x)
            && (self.min_y..=self.max_y).contains(&position.y)
            && (self.min_z..=self.max_z).contains(&position.z)
    }

    /// Nearest point inside the region.
    pub fn clamp(&self, position: Vec3) -> Vec3 {
        Vec3::new(
            position.x.clamp(self.min_x, self.max_x),
            position.y.clamp(self.min_y, self.max_y),
            position.z.clamp(self.min_z, self.max_z),
        )
    }

    /// Centre of the ground plane.
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
            self.min_z,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn depth(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_path: None,
        }
    }
}

/// Synthetic load: walking presences that chat and carry objects around.
/// Zero presences disables the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default)]
    pub synthetic_presences: usize,
    #[serde(default = "default_synthetic_objects")]
    pub synthetic_objects: usize,
    #[serde(default = "default_sim_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_synthetic_objects() -> usize {
    32
}

fn default_sim_tick_interval() -> u64 {
    100 // 10 ticks per second
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            synthetic_presences: 0,
            synthetic_objects: default_synthetic_objects(),
            tick_interval_ms: default_sim_tick_interval(),
        }
    }
}

impl SimulationSettings {
    pub fn is_enabled(&self) -> bool {
        self.synthetic_presences > 0
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self, ServerError> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("📝 Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file's values.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(heartbeat_ms) = args.heartbeat_ms {
            self.scheduler.heartbeat_interval_ms = heartbeat_ms;
        }
        if let Some(presences) = args.simulate {
            self.simulation.synthetic_presences = presences;
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.scene_name.trim().is_empty() {
            return Err("Scene name cannot be empty".to_string());
        }

        let region = &self.server.region;
        if region.min_x >= region.max_x {
            return Err("Region min_x must be less than max_x".to_string());
        }
        if region.min_y >= region.max_y {
            return Err("Region min_y must be less than max_y".to_string());
        }
        if region.min_z >= region.max_z {
            return Err("Region min_z must be less than max_z".to_string());
        }

        if self.server.max_presences == 0 {
            return Err("max_presences must be greater than 0".to_string());
        }

        self.engine.validate().map_err(|e| format!("engine: {e}"))?;
        self.scheduler.validate().map_err(|e| format!("scheduler: {e}"))?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        if self.simulation.is_enabled() {
            if self.simulation.tick_interval_ms == 0 {
                return Err("simulation.tick_interval_ms must be greater than 0".to_string());
            }
            if self.simulation.synthetic_presences > self.server.max_presences {
                return Err(format!(
                    "simulation.synthetic_presences ({}) exceeds server.max_presences ({})",
                    self.simulation.synthetic_presences, self.server.max_presences
                ));
            }
        }

        Ok(())
    }
}
