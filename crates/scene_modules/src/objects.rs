//! # Object Synchronization
//!
//! Replicates scene objects (prims) to every presence that can see them.
//!
//! ## Coalescing
//!
//! Updates are keyed per object, so an object that moves ten times between
//! two drains costs one update block. The pending update keeps the newest
//! object state and the union of the change flags of everything it
//! replaced, so a position-only update never hides an earlier shape change.
//!
//! ## Removal
//!
//! Kills use their own key and are biased one unit more urgent than an
//! update at the same distance, so they are never starved by a busy
//! neighbourhood. Removing an object leaves a tombstone, so an update still
//! pending for it is dropped rather than announcing the removal twice. An
//! update for an object this module never knew is sent as a kill.

use crate::messages::{ObjectUpdateBlock, OutboundMessage};
use crate::transport::ClientTransport;
use crate::SceneModule;
use dashmap::{DashMap, DashSet};
use interest_engine::{
    biased, Delivery, EngineError, Event, EventId, EventType, Presence, PresenceLifecycle, PublishReport,
    Scene, SendError, Vec3,
};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const OBJECT_UPDATE: &str = "object.update";
pub const OBJECT_KILL: &str = "object.kill";

const UPDATE_KEY: Uuid = Uuid::from_u128(0x6f62_6a65_6374_0000_7570_6461_7465_0001);
const KILL_KEY: Uuid = Uuid::from_u128(0x6f62_6a65_6374_0000_6b69_6c6c_0000_0002);

/// Bytes charged per update block under a byte budget.
const UPDATE_BLOCK_SIZE: usize = 96;

/// Which parts of an object changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UpdateFlags(pub u32);

impl UpdateFlags {
    pub const POSITION: UpdateFlags = UpdateFlags(1 << 0);
    pub const ROTATION: UpdateFlags = UpdateFlags(1 << 1);
    pub const SCALE: UpdateFlags = UpdateFlags(1 << 2);
    pub const SHAPE: UpdateFlags = UpdateFlags(1 << 3);
    pub const TEXTURE: UpdateFlags = UpdateFlags(1 << 4);
    pub const TEXT: UpdateFlags = UpdateFlags(1 << 5);
    pub const FULL: UpdateFlags = UpdateFlags(0x3f);

    pub fn contains(self, other: UpdateFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for UpdateFlags {
    type Output = UpdateFlags;

    fn bitor(self, rhs: UpdateFlags) -> UpdateFlags {
        UpdateFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: Uuid,
    /// Region-local handle the client protocol addresses objects by
    pub local_id: u32,
    pub name: String,
    pub position: Vec3,
    pub scale: Vec3,
}

/// Payload of an `object.update` event.
#[derive(Debug, Clone)]
pub struct ObjectUpdate {
    pub object: SceneObject,
    pub flags: UpdateFlags,
}

/// Payload of an `object.kill` event.
#[derive(Debug, Clone, Copy)]
pub struct ObjectKill {
    pub object_id: Uuid,
    pub local_id: u32,
}

pub fn update_event_id(object_id: Uuid) -> EventId {
    EventId::combine(object_id, UPDATE_KEY)
}

pub fn kill_event_id(object_id: Uuid) -> EventId {
    EventId::combine(object_id, KILL_KEY)
}

pub struct ObjectsModule {
    transport: Arc<dyn ClientTransport>,
    objects: DashMap<Uuid, SceneObject>,
    /// Objects whose kill has already been published
    removed: DashSet<Uuid>,
}

impl ObjectsModule {
    pub fn new(transport: Arc<dyn ClientTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            objects: DashMap::new(),
            removed: DashSet::new(),
        })
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, id: Uuid) -> Option<SceneObject> {
        self.objects.get(&id).map(|entry| entry.value().clone())
    }

    /// Records the new state of `object` and publishes it to everyone.
    pub fn upsert_object(
        &self,
        scene: &Scene,
        object: SceneObject,
        flags: UpdateFlags,
    ) -> Result<PublishReport, EngineError> {
        self.objects.insert(object.id, object.clone());
        self.removed.remove(&object.id);
        scene.publish(update_event(object, flags))
    }

    /// Forgets an object and publishes its removal. Returns `None` if the
    /// object was unknown.
    pub fn remove_object(&self, scene: &Scene, object_id: Uuid) -> Result<Option<PublishReport>, EngineError> {
        if !self.objects.contains_key(&object_id) {
            return Ok(None);
        }
        self.removed.insert(object_id);
        let Some((_, object)) = self.objects.remove(&object_id) else {
            self.removed.remove(&object_id);
            return Ok(None);
        };

        let kill = ObjectKill {
            object_id,
            local_id: object.local_id,
        };
        let event = Event::new(kill_event_id(object_id), OBJECT_KILL, object.position, kill).with_extent(object.scale);
        scene.publish(event).map(Some)
    }

    fn send_updates(&self, batch: &[Delivery<'_, ObjectUpdate>], presence: &Presence) -> Result<(), SendError> {
        let mut blocks = Vec::with_capacity(batch.len());
        let mut stale = Vec::new();
        let mut superseded = 0;

        for delivery in batch {
            let update = delivery.payload;
            if self.objects.contains_key(&update.object.id) {
                blocks.push(ObjectUpdateBlock {
                    object_id: update.object.id,
                    local_id: update.object.local_id,
                    flags: update.flags.0,
                    position: update.object.position,
                    scale: update.object.scale,
                    name: update.object.name.clone(),
                });
            } else if self.removed.contains(&update.object.id) {
                superseded += 1;
            } else {
                stale.push(update.object.local_id);
            }
        }

        if superseded > 0 {
            debug!(
                "Dropped {} updates for removed objects bound for presence {}",
                superseded,
                presence.id()
            );
        }

        if !stale.is_empty() {
            debug!(
                "Object update for {} unknown objects sent as kills to presence {}",
                stale.len(),
                presence.id()
            );
            self.transport
                .deliver(presence.id(), OutboundMessage::KillObjects { local_ids: stale })?;
        }
        if !blocks.is_empty() {
            self.transport
                .deliver(presence.id(), OutboundMessage::ObjectUpdates { blocks })?;
        }
        Ok(())
    }

    fn send_kills(&self, batch: &[Delivery<'_, ObjectKill>], presence: &Presence) -> Result<(), SendError> {
        let local_ids = batch.iter().map(|delivery| delivery.payload.local_id).collect();
        self.transport
            .deliver(presence.id(), OutboundMessage::KillObjects { local_ids })?;
        Ok(())
    }
}

fn update_event(object: SceneObject, flags: UpdateFlags) -> Event {
    let (id, position, scale) = (update_event_id(object.id), object.position, object.scale);
    Event::new(id, OBJECT_UPDATE, position, ObjectUpdate { object, flags }).with_extent(scale)
}

impl SceneModule for ObjectsModule {
    fn name(&self) -> &str {
        "objects"
    }

    fn register(self: Arc<Self>, scene: &Scene) {
        let module = Arc::clone(&self);
        scene.register_type(
            EventType::<ObjectUpdate>::new(OBJECT_UPDATE, move |batch, presence| module.send_updates(batch, presence))
                .combine(|pending, newer| ObjectUpdate {
                    object: newer.object.clone(),
                    flags: pending.flags | newer.flags,
                })
                .size_hint(|_| UPDATE_BLOCK_SIZE),
        );

        let module = Arc::clone(&self);
        scene.register_type(
            EventType::<ObjectKill>::new(OBJECT_KILL, move |batch, presence| module.send_kills(batch, presence))
                .priority(|event, _, presence| biased(event, presence, -1.0))
                .size_hint(|_| 4),
        );

        scene.add_lifecycle_hook(self);
    }
}

impl PresenceLifecycle for ObjectsModule {
    fn name(&self) -> &str {
        "objects"
    }

    /// Queues a full update of every known object for the joiner.
    fn on_join(&self, scene: &Scene, presence: &Arc<Presence>) {
        let snapshot: Vec<SceneObject> = self.objects.iter().map(|entry| entry.value().clone()).collect();
        for object in snapshot {
            if let Err(err) = scene.publish_to(presence.id(), update_event(object, UpdateFlags::FULL)) {
                warn!("⚠️ Could not seed objects for presence {}: {}", presence.id(), err);
                return;
            }
        }
    }
}
