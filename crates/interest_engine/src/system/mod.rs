/// Scene module - the engine's public operations, split by concern
mod core;
mod dispatch;
mod drain;
mod lifecycle;
mod stats;
#[cfg(test)]
mod tests;

pub use core::Scene;
pub use dispatch::PublishReport;
pub use drain::{DrainBudget, DrainReport};
pub use lifecycle::PresenceLifecycle;
pub use stats::EngineStats;
