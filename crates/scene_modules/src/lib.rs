//! # Scene Modules
//!
//! Feature modules that turn scene state changes into events for the
//! [`interest_engine`], and drained batches back into client protocol
//! messages.
//!
//! ## Overview
//!
//! Every module follows the same shape:
//! - it registers one or more event types on a [`Scene`], each with a
//!   priority rule and a send handler that produces [`OutboundMessage`]s
//! - it exposes producer methods (`upsert_object`, `say`, `edit_patch`, ...)
//!   that build events and publish them
//! - if joining presences need a snapshot of existing state, it also
//!   registers itself as a [`PresenceLifecycle`](interest_engine::PresenceLifecycle) hook
//!
//! | Module | Event types | Priority | Coalescing |
//! |--------|-------------|----------|------------|
//! | [`objects`] | `object.update`, `object.kill` | distance, kills biased -1 | per object, flags OR-ed |
//! | [`appearance`] | `avatar.appearance` | distance + 1 | per avatar |
//! | [`chat`] | `chat.message`, `chat.typing`, `chat.im` | distance within chat range | typing per avatar |
//! | [`terrain`] | `terrain.patch` | distance | per patch |
//! | [`ambient`] | `ambient.sound_preload` | distance within 64 m | per object |
//! | [`parcel`] | `parcel.overlay` | 0 | per presence and quarter |
//!
//! ## Example Usage
//!
//! ```rust
//! use scene_modules::{install_default_modules, transport::ChannelTransport};
//! use interest_engine::{create_scene, DrainBudget, EngineConfig, PresenceId, Vec3};
//! use std::sync::Arc;
//!
//! let scene = create_scene("region", EngineConfig::default());
//! let transport = Arc::new(ChannelTransport::new());
//! let modules = install_default_modules(&scene, transport.clone());
//!
//! let speaker = PresenceId::new();
//! let mut inbox = transport.connect(speaker);
//! scene.join(speaker, Vec3::new(128.0, 128.0, 25.0))?;
//! modules.chat.say(&scene, speaker, "Ada", "hello", Vec3::new(128.0, 128.0, 25.0))?;
//!
//! scene.drain(speaker, DrainBudget::Unlimited)?;
//! while let Ok(message) = inbox.try_recv() {
//!     println!("{}", message.kind());
//! }
//! # Ok::<(), interest_engine::EngineError>(())
//! ```

use interest_engine::Scene;
use std::sync::Arc;
use tracing::info;

pub mod ambient;
pub mod appearance;
pub mod chat;
pub mod messages;
pub mod objects;
pub mod parcel;
pub mod terrain;
pub mod transport;

#[cfg(test)]
mod tests;

pub use messages::OutboundMessage;
pub use transport::{ChannelTransport, ClientTransport, TransportError};

/// A feature that registers event types (and possibly lifecycle hooks) on a
/// scene.
pub trait SceneModule: Send + Sync {
    fn name(&self) -> &str;

    /// Registers the module's event types and hooks. Registering twice
    /// replaces the earlier handlers.
    fn register(self: Arc<Self>, scene: &Scene);
}

/// Handles to every built-in module, installed on one scene.
#[derive(Clone)]
pub struct SceneModules {
    pub objects: Arc<objects::ObjectsModule>,
    pub appearance: Arc<appearance::AppearanceModule>,
    pub chat: Arc<chat::ChatModule>,
    pub terrain: Arc<terrain::TerrainModule>,
    pub ambient: Arc<ambient::AmbientModule>,
    pub parcel: Arc<parcel::ParcelModule>,
}

/// Creates every built-in module over `transport` and registers it on
/// `scene`.
pub fn install_default_modules(scene: &Scene, transport: Arc<dyn ClientTransport>) -> SceneModules {
    let modules = SceneModules {
        objects: objects::ObjectsModule::new(transport.clone()),
        appearance: appearance::AppearanceModule::new(transport.clone()),
        chat: chat::ChatModule::new(transport.clone()),
        terrain: terrain::TerrainModule::new(transport.clone()),
        ambient: ambient::AmbientModule::new(transport.clone()),
        parcel: parcel::ParcelModule::new(transport),
    };

    let all: [Arc<dyn SceneModule>; 6] = [
        modules.objects.clone(),
        modules.appearance.clone(),
        modules.chat.clone(),
        modules.terrain.clone(),
        modules.ambient.clone(),
        modules.parcel.clone(),
    ];
    for module in all {
        let name = module.name().to_string();
        module.register(scene);
        info!("🧩 Module '{}' installed on scene '{}'", name, scene.name());
    }
    modules
}
