//! Engine configuration.
//!
//! These types are embedded in the server's TOML configuration, so every
//! field has a serde default and a partially written section still loads.

use serde::{Deserialize, Serialize};

/// What to do when an event is published under a type name nobody registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTypePolicy {
    /// Treat it as a programmer error and panic
    Panic,
    /// Log an error and return [`EngineError::UnregisteredType`](crate::EngineError::UnregisteredType)
    LogAndDrop,
}

impl Default for UnknownTypePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::LogAndDrop
        }
    }
}

/// Tunables for a [`Scene`](crate::Scene).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub unknown_type_policy: UnknownTypePolicy,
    /// Byte cost charged for an entry whose type has no size hint
    #[serde(default = "default_entry_size")]
    pub default_entry_size: usize,
    /// Distance a presence must move before its pending entries are
    /// re-scored. `None` disables re-scoring.
    #[serde(default = "default_reprioritize_distance")]
    pub reprioritize_distance: Option<f64>,
}

fn default_entry_size() -> usize {
    64
}

fn default_reprioritize_distance() -> Option<f64> {
    Some(16.0)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_type_policy: UnknownTypePolicy::default(),
            default_entry_size: default_entry_size(),
            reprioritize_distance: default_reprioritize_distance(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_entry_size == 0 {
            return Err("default_entry_size must be greater than 0".to_string());
        }
        if let Some(distance) = self.reprioritize_distance {
            if !distance.is_finite() || distance < 0.0 {
                return Err(format!(
                    "reprioritize_distance must be a non-negative finite number, got {distance}"
                ));
            }
        }
        Ok(())
    }
}
