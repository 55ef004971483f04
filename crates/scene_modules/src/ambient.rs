//! Ambient sound preloading.
//!
//! Objects that loop or trigger sounds ask nearby clients to fetch the
//! asset ahead of time. Only presences within 64 m (4096 squared units) get
//! the preload; anyone farther would fetch assets they are unlikely to hear.

use crate::messages::{OutboundMessage, SoundPreloadBlock};
use crate::transport::ClientTransport;
use crate::SceneModule;
use interest_engine::{
    within_cutoff, Delivery, EngineError, Event, EventId, EventType, Presence, PublishReport, Scene, SendError,
    Vec3,
};
use std::sync::Arc;
use uuid::Uuid;

pub const AMBIENT_SOUND_PRELOAD: &str = "ambient.sound_preload";

pub const PRELOAD_RANGE_SQUARED: f64 = 4096.0;

const PRELOAD_KEY: Uuid = Uuid::from_u128(0x736f_756e_6400_0000_0000_0000_0000_0001);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundPreload {
    pub sound_id: Uuid,
    pub object_id: Uuid,
    pub owner_id: Uuid,
}

pub struct AmbientModule {
    transport: Arc<dyn ClientTransport>,
}

impl AmbientModule {
    pub fn new(transport: Arc<dyn ClientTransport>) -> Arc<Self> {
        Arc::new(Self { transport })
    }

    /// Publishes a preload hint for the sound an object at `position` is
    /// about to play. A newer hint from the same object replaces a pending
    /// one.
    pub fn preload(&self, scene: &Scene, preload: SoundPreload, position: Vec3) -> Result<PublishReport, EngineError> {
        let id = EventId::combine(preload.object_id, PRELOAD_KEY);
        scene.publish(Event::new(id, AMBIENT_SOUND_PRELOAD, position, preload))
    }

    fn send(&self, batch: &[Delivery<'_, SoundPreload>], presence: &Presence) -> Result<(), SendError> {
        let sounds = batch
            .iter()
            .map(|delivery| SoundPreloadBlock {
                sound_id: delivery.payload.sound_id,
                object_id: delivery.payload.object_id,
                owner_id: delivery.payload.owner_id,
            })
            .collect();
        self.transport
            .deliver(presence.id(), OutboundMessage::PreloadSound { sounds })?;
        Ok(())
    }
}

impl SceneModule for AmbientModule {
    fn name(&self) -> &str {
        "ambient"
    }

    fn register(self: Arc<Self>, scene: &Scene) {
        let module = self;
        scene.register_type(
            EventType::<SoundPreload>::new(AMBIENT_SOUND_PRELOAD, move |batch, presence| module.send(batch, presence))
                .priority(|event, _, presence| within_cutoff(event, presence, PRELOAD_RANGE_SQUARED))
                .size_hint(|_| 48),
        );
    }
}
