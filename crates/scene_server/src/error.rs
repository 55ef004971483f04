//! Errors raised while bootstrapping and running the scene server.

use interest_engine::{EngineError, PresenceId};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The scene already holds `max_presences` presences
    #[error("Scene is full ({max} presences), cannot admit {presence}")]
    SceneFull { presence: PresenceId, max: usize },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
