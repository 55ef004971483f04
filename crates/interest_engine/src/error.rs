//! Error types for the interest engine.
//!
//! [`EngineError`] covers misuse of the engine API itself; [`SendError`] is
//! what a type's send handler reports when it cannot produce its outbound
//! effect. Send failures are logged and counted by the drain, never
//! propagated to the caller that triggered it.

use crate::types::PresenceId;

/// Errors returned by registry, dispatch, drain and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An event was published under a type name nobody registered
    #[error("Event type '{0}' is not registered")]
    UnregisteredType(String),

    /// The addressed presence is not (or no longer) in the scene
    #[error("Presence {0} not found")]
    PresenceNotFound(PresenceId),

    /// A presence with this ID has already joined the scene
    #[error("Presence {0} has already joined")]
    PresenceAlreadyJoined(PresenceId),

    /// A combine handler was given payloads of the wrong Rust type
    #[error("Payload for '{type_name}' is not a {expected}")]
    PayloadMismatch {
        type_name: String,
        expected: &'static str,
    },

    /// The drain scheduler has stopped and no longer accepts signals
    #[error("Drain scheduler is no longer running")]
    SchedulerClosed,
}

/// Failure reported by a type's send handler.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Payload for '{type_name}' is not a {expected}")]
    PayloadMismatch {
        type_name: String,
        expected: &'static str,
    },

    #[error("Send rejected: {0}")]
    Rejected(String),
}
