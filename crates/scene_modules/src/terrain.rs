//! Terrain patch edits.
//!
//! The region heightmap is split into 16x16 patches. Each edited patch is
//! its own coalescing key, so repeated brush strokes over the same patch
//! between drains cost one patch, and one drain packs every pending patch
//! into a single layer-data message. Joiners receive every patch that has
//! been edited since startup.

use crate::messages::{OutboundMessage, PatchBlock};
use crate::transport::ClientTransport;
use crate::SceneModule;
use dashmap::DashMap;
use interest_engine::{
    Delivery, EngineError, Event, EventId, EventType, Presence, PresenceLifecycle, PublishReport, Scene,
    SendError, Vec3,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub const TERRAIN_PATCH: &str = "terrain.patch";

/// Side length of one patch, in scene units.
pub const PATCH_SIZE: f64 = 16.0;
pub const PATCH_SAMPLES: usize = 16 * 16;

const PATCH_KEY: Uuid = Uuid::from_u128(0x7465_7272_6169_6e00_0000_0000_0000_0001);

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainPatch {
    pub x: u16,
    pub y: u16,
    /// Row-major heights, [`PATCH_SAMPLES`] of them
    pub heights: Vec<f32>,
}

impl TerrainPatch {
    /// Centre of the patch at its mean height.
    pub fn center(&self) -> Vec3 {
        let mean = if self.heights.is_empty() {
            0.0
        } else {
            self.heights.iter().map(|h| f64::from(*h)).sum::<f64>() / self.heights.len() as f64
        };
        Vec3::new(
            (f64::from(self.x) + 0.5) * PATCH_SIZE,
            (f64::from(self.y) + 0.5) * PATCH_SIZE,
            mean,
        )
    }
}

pub fn patch_event_id(x: u16, y: u16) -> EventId {
    let coordinates = (u128::from(x) << 16) | u128::from(y);
    EventId::combine(Uuid::from_u128(coordinates), PATCH_KEY)
}

pub struct TerrainModule {
    transport: Arc<dyn ClientTransport>,
    edited: DashMap<(u16, u16), TerrainPatch>,
}

impl TerrainModule {
    pub fn new(transport: Arc<dyn ClientTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            edited: DashMap::new(),
        })
    }

    pub fn edited_patch_count(&self) -> usize {
        self.edited.len()
    }

    /// Stores the patch's new heights and publishes the edit.
    pub fn edit_patch(&self, scene: &Scene, patch: TerrainPatch) -> Result<PublishReport, EngineError> {
        if patch.heights.len() != PATCH_SAMPLES {
            warn!(
                "⚠️ Terrain patch ({}, {}) has {} samples, expected {}",
                patch.x,
                patch.y,
                patch.heights.len(),
                PATCH_SAMPLES
            );
        }
        self.edited.insert((patch.x, patch.y), patch.clone());
        scene.publish(patch_event(patch))
    }

    fn send(&self, batch: &[Delivery<'_, TerrainPatch>], presence: &Presence) -> Result<(), SendError> {
        let patches = batch
            .iter()
            .map(|delivery| PatchBlock {
                x: delivery.payload.x,
                y: delivery.payload.y,
                heights: delivery.payload.heights.clone(),
            })
            .collect();
        self.transport
            .deliver(presence.id(), OutboundMessage::LayerData { patches })?;
        Ok(())
    }
}

fn patch_event(patch: TerrainPatch) -> Event {
    let (id, center) = (patch_event_id(patch.x, patch.y), patch.center());
    Event::new(id, TERRAIN_PATCH, center, patch).with_extent(Vec3::new(PATCH_SIZE, PATCH_SIZE, 0.0))
}

impl SceneModule for TerrainModule {
    fn name(&self) -> &str {
        "terrain"
    }

    fn register(self: Arc<Self>, scene: &Scene) {
        let module = Arc::clone(&self);
        scene.register_type(
            EventType::<TerrainPatch>::new(TERRAIN_PATCH, move |batch, presence| module.send(batch, presence))
                .size_hint(|patch| 8 + 2 * patch.heights.len()),
        );
        scene.add_lifecycle_hook(self);
    }
}

impl PresenceLifecycle for TerrainModule {
    fn name(&self) -> &str {
        "terrain"
    }

    fn on_join(&self, scene: &Scene, presence: &Arc<Presence>) {
        let patches: Vec<TerrainPatch> = self.edited.iter().map(|entry| entry.value().clone()).collect();
        for patch in patches {
            if let Err(err) = scene.publish_to(presence.id(), patch_event(patch)) {
                warn!("⚠️ Could not seed terrain for presence {}: {}", presence.id(), err);
                return;
            }
        }
    }
}
