//! Parcel overlay.
//!
//! The overlay is the region's 64x64 grid of parcel ownership/boundary
//! bytes. Clients need it once on arrival and again whenever it changes;
//! it is never broadcast spatially. It is pushed in four quarters with
//! [`Scene::publish_to`], each keyed per presence and quarter, at priority
//! 0 so it drains ahead of distant scenery.

use crate::messages::OutboundMessage;
use crate::transport::ClientTransport;
use crate::SceneModule;
use interest_engine::{
    Delivery, EngineError, Event, EventId, EventType, Presence, PresenceId, PresenceLifecycle, Priority,
    PublishReport, Scene, SendError, Vec3,
};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;
use uuid::Uuid;

pub const PARCEL_OVERLAY: &str = "parcel.overlay";

/// Bytes in a full overlay (one per 4x4 m cell of a 256 m region).
pub const OVERLAY_SIZE: usize = 64 * 64;
pub const OVERLAY_PARTS: u8 = 4;

const OVERLAY_KEY: u128 = 0x7061_7263_656c_0000_0000_0000_0000_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayPart {
    pub sequence: u8,
    pub data: Vec<u8>,
}

pub fn overlay_event_id(presence: PresenceId, sequence: u8) -> EventId {
    EventId::combine(presence.0, Uuid::from_u128(OVERLAY_KEY | u128::from(sequence)))
}

pub struct ParcelModule {
    transport: Arc<dyn ClientTransport>,
    overlay: RwLock<Vec<u8>>,
}

impl ParcelModule {
    pub fn new(transport: Arc<dyn ClientTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            overlay: RwLock::new(vec![0; OVERLAY_SIZE]),
        })
    }

    pub fn overlay(&self) -> Vec<u8> {
        self.overlay.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the overlay and pushes it to every presence in the scene.
    /// Short input is zero-padded, long input truncated.
    pub fn set_overlay(&self, scene: &Scene, mut overlay: Vec<u8>) -> Result<PublishReport, EngineError> {
        overlay.resize(OVERLAY_SIZE, 0);
        *self.overlay.write().unwrap_or_else(PoisonError::into_inner) = overlay;

        let mut total = PublishReport::default();
        for presence in scene.presence_ids() {
            match self.push_to(scene, presence) {
                Ok(report) => {
                    total.queued += report.queued;
                    total.coalesced += report.coalesced;
                    total.suppressed += report.suppressed;
                }
                // Left between listing and publishing
                Err(EngineError::PresenceNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    /// Queues all overlay quarters for one presence.
    pub fn push_to(&self, scene: &Scene, presence: PresenceId) -> Result<PublishReport, EngineError> {
        let overlay = self.overlay();
        let part_len = OVERLAY_SIZE / usize::from(OVERLAY_PARTS);

        let mut total = PublishReport::default();
        for (sequence, chunk) in (0..OVERLAY_PARTS).zip(overlay.chunks(part_len)) {
            let part = OverlayPart {
                sequence,
                data: chunk.to_vec(),
            };
            let event = Event::new(overlay_event_id(presence, sequence), PARCEL_OVERLAY, Vec3::zero(), part);
            let report = scene.publish_to(presence, event)?;
            total.queued += report.queued;
            total.coalesced += report.coalesced;
        }
        Ok(total)
    }

    fn send(&self, batch: &[Delivery<'_, OverlayPart>], presence: &Presence) -> Result<(), SendError> {
        for delivery in batch {
            self.transport.deliver(
                presence.id(),
                OutboundMessage::ParcelOverlay {
                    sequence: delivery.payload.sequence,
                    data: delivery.payload.data.clone(),
                },
            )?;
        }
        Ok(())
    }
}

impl SceneModule for ParcelModule {
    fn name(&self) -> &str {
        "parcel"
    }

    fn register(self: Arc<Self>, scene: &Scene) {
        let module = Arc::clone(&self);
        scene.register_type(
            EventType::<OverlayPart>::new(PARCEL_OVERLAY, move |batch, presence| module.send(batch, presence))
                .priority(|_, _, _| Some(Priority::new(0.0)))
                .size_hint(|part| 8 + part.data.len()),
        );
        scene.add_lifecycle_hook(self);
    }
}

impl PresenceLifecycle for ParcelModule {
    fn name(&self) -> &str {
        "parcel"
    }

    fn on_join(&self, scene: &Scene, presence: &Arc<Presence>) {
        if let Err(err) = self.push_to(scene, presence.id()) {
            warn!("⚠️ Could not push parcel overlay to {}: {}", presence.id(), err);
        }
    }
}
