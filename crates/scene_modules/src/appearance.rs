//! Avatar appearance: visual parameters and baked texture IDs.
//!
//! Appearance is keyed per avatar, so a burst of wearable changes collapses
//! into the latest appearance. It is biased one unit behind object updates
//! at the same distance: a client that has not yet seen the avatar's object
//! cannot apply an appearance to it.

use crate::messages::OutboundMessage;
use crate::transport::ClientTransport;
use crate::SceneModule;
use dashmap::DashMap;
use interest_engine::{
    biased, Delivery, EngineError, Event, EventId, EventType, Presence, PresenceId, PresenceLifecycle,
    PublishReport, Scene, SendError,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub const AVATAR_APPEARANCE: &str = "avatar.appearance";

const APPEARANCE_KEY: Uuid = Uuid::from_u128(0x6170_7065_6172_616e_6365_0000_0000_0001);

/// Drains after an object update at the same distance.
pub const APPEARANCE_BIAS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    /// Increases with every change the viewer sends
    pub serial: u32,
    pub visual_params: Vec<u8>,
    pub texture_ids: Vec<Uuid>,
}

pub fn appearance_event_id(avatar: PresenceId) -> EventId {
    EventId::combine(avatar.0, APPEARANCE_KEY)
}

pub struct AppearanceModule {
    transport: Arc<dyn ClientTransport>,
    appearances: DashMap<PresenceId, Appearance>,
}

impl AppearanceModule {
    pub fn new(transport: Arc<dyn ClientTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            appearances: DashMap::new(),
        })
    }

    pub fn appearance(&self, avatar: PresenceId) -> Option<Appearance> {
        self.appearances.get(&avatar).map(|entry| entry.value().clone())
    }

    /// Stores the avatar's new appearance and publishes it to everyone.
    pub fn set_appearance(
        &self,
        scene: &Scene,
        avatar: PresenceId,
        appearance: Appearance,
    ) -> Result<PublishReport, EngineError> {
        let presence = scene
            .presence(avatar)
            .ok_or(EngineError::PresenceNotFound(avatar))?;
        self.appearances.insert(avatar, appearance.clone());
        scene.publish(appearance_event(&presence, appearance))
    }

    fn send(&self, batch: &[Delivery<'_, (PresenceId, Appearance)>], presence: &Presence) -> Result<(), SendError> {
        for delivery in batch {
            let (avatar, appearance) = delivery.payload;
            self.transport.deliver(
                presence.id(),
                OutboundMessage::AvatarAppearance {
                    avatar_id: avatar.0,
                    serial: appearance.serial,
                    visual_params: appearance.visual_params.clone(),
                    texture_ids: appearance.texture_ids.clone(),
                },
            )?;
        }
        Ok(())
    }
}

fn appearance_event(avatar: &Presence, appearance: Appearance) -> Event {
    Event::new(
        appearance_event_id(avatar.id()),
        AVATAR_APPEARANCE,
        avatar.position(),
        (avatar.id(), appearance),
    )
}

impl SceneModule for AppearanceModule {
    fn name(&self) -> &str {
        "appearance"
    }

    fn register(self: Arc<Self>, scene: &Scene) {
        let module = Arc::clone(&self);
        scene.register_type(
            EventType::<(PresenceId, Appearance)>::new(AVATAR_APPEARANCE, move |batch, presence| {
                module.send(batch, presence)
            })
            .priority(|event, _, presence| biased(event, presence, APPEARANCE_BIAS))
            .size_hint(|(_, appearance)| 32 + appearance.visual_params.len() + 16 * appearance.texture_ids.len()),
        );
        scene.add_lifecycle_hook(self);
    }
}

impl PresenceLifecycle for AppearanceModule {
    fn name(&self) -> &str {
        "appearance"
    }

    /// Sends the joiner every other avatar's current appearance.
    fn on_join(&self, scene: &Scene, presence: &Arc<Presence>) {
        let known: Vec<(PresenceId, Appearance)> = self
            .appearances
            .iter()
            .filter(|entry| *entry.key() != presence.id())
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (avatar, appearance) in known {
            let Some(other) = scene.presence(avatar) else {
                continue;
            };
            if let Err(err) = scene.publish_to(presence.id(), appearance_event(&other, appearance)) {
                warn!("⚠️ Could not seed appearance of {} for {}: {}", avatar, presence.id(), err);
            }
        }
    }

    fn on_leave(&self, _scene: &Scene, presence_id: PresenceId) {
        self.appearances.remove(&presence_id);
    }
}
