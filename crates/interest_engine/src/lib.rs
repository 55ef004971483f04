//! # Interest Engine
//!
//! Per-presence interest management and event dissemination for a shared
//! virtual-world scene. Every state change in the scene (an object moving,
//! an avatar changing appearance, a line of chat, a terrain edit) is
//! published once; the engine decides, for each connected client, whether
//! it is relevant, how urgent it is, and whether it supersedes something
//! already waiting, then drains the most urgent entries into per-type
//! outbound batches.
//!
//! ## Core Features
//!
//! - **Coalescing**: events sharing an [`EventId`] collapse into one pending
//!   entry per presence, so a fast-moving object costs one update per drain
//! - **Per-presence priority**: each type's priority function scores an
//!   event for one presence, or suppresses it entirely
//! - **Budgeted draining**: entry or byte budgets, most urgent first,
//!   grouped by type so one send call covers a whole batch
//! - **Fault isolation**: a failing or panicking send handler never stops
//!   the rest of a drain
//! - **Concurrent producers**: `publish` is synchronous and callable from
//!   any thread; the only lock held is one presence's list for one insert
//!
//! ## Architecture Overview
//!
//! - [`Scene`] owns a [`TypeRegistry`], the connected [`Presence`]s and
//!   their [`InterestList`]s
//! - [`Scene::publish`] / [`Scene::publish_to`] insert or coalesce events
//! - [`Scene::drain`] extracts, groups and sends
//! - [`DrainScheduler`] calls the drain on a heartbeat and on readiness
//!   signals from the transport
//! - [`PresenceLifecycle`] hooks seed joining presences
//!
//! ## Quick Start Example
//!
//! ```rust
//! use interest_engine::*;
//!
//! #[derive(Debug)]
//! struct ChatLine { from: String, text: String }
//!
//! let scene = create_scene("region", EngineConfig::default());
//! scene.register_type(
//!     EventType::<ChatLine>::new("chat.message", |batch, presence| {
//!         for line in batch {
//!             println!("to {}: <{}> {}", presence.id(), line.payload.from, line.payload.text);
//!         }
//!         Ok(())
//!     })
//!     .priority(|event, _, presence| priority::within_cutoff(event, presence, 400.0)),
//! );
//!
//! let listener = PresenceId::new();
//! scene.join(listener, Vec3::new(5.0, 0.0, 0.0))?;
//!
//! let line = ChatLine { from: "Ada".into(), text: "hello".into() };
//! scene.publish(Event::new(EventId::random(), "chat.message", Vec3::zero(), line))?;
//!
//! let report = scene.drain(listener, DrainBudget::Unlimited)?;
//! assert_eq!(report.drained, 1);
//! # Ok::<(), EngineError>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod interest;
pub mod presence;
pub mod priority;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod system;
pub mod types;
pub mod utils;

pub use config::{EngineConfig, UnknownTypePolicy};
pub use error::{EngineError, SendError};
pub use events::{Event, Payload};
pub use interest::{InsertOutcome, InterestList, PendingEntry};
pub use presence::Presence;
pub use priority::{biased, default_priority, within_cutoff};
pub use registry::{Delivery, EventType, TypeHandlers, TypeRegistry};
pub use scheduler::{DrainScheduler, ReadySignal, SchedulerConfig, SchedulerHandle};
pub use shutdown::ShutdownState;
pub use system::{DrainBudget, DrainReport, EngineStats, PresenceLifecycle, PublishReport, Scene};
pub use types::*;
pub use utils::{create_scene, current_timestamp};
