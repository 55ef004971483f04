/// Presence join/leave and movement
use super::core::Scene;
use super::stats::StatsCounters;
use crate::error::EngineError;
use crate::presence::Presence;
use crate::types::{EventId, PresenceId, Priority, Vec3};
use crate::utils::write;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Hook run when presences join or leave a scene.
///
/// Feature modules implement this to seed a joining presence with the
/// current state of everything it should know about, by calling
/// [`Scene::publish_to`] for each existing entity. Hooks run after the
/// presence is visible in the scene, so events published concurrently by
/// other producers are not lost.
pub trait PresenceLifecycle: Send + Sync {
    fn name(&self) -> &str;

    fn on_join(&self, scene: &Scene, presence: &Arc<Presence>);

    fn on_leave(&self, _scene: &Scene, _presence_id: PresenceId) {}
}

impl Scene {
    /// Adds a join/leave hook. Hooks run in registration order.
    pub fn add_lifecycle_hook(&self, hook: Arc<dyn PresenceLifecycle>) {
        info!("🪝 Lifecycle hook '{}' added to scene '{}'", hook.name(), self.name);
        write(&self.hooks).push(hook);
    }

    /// Adds a presence at `position` and runs every join hook for it.
    pub fn join(&self, presence_id: PresenceId, position: Vec3) -> Result<Arc<Presence>, EngineError> {
        let presence = match self.presences.entry(presence_id) {
            Entry::Occupied(_) => return Err(EngineError::PresenceAlreadyJoined(presence_id)),
            Entry::Vacant(slot) => {
                let presence = Arc::new(Presence::new(presence_id, position));
                slot.insert(Arc::clone(&presence));
                presence
            }
        };
        StatsCounters::bump(&self.stats.presences_joined);

        for hook in self.hooks_snapshot() {
            debug!("Seeding presence {} via '{}'", presence_id, hook.name());
            hook.on_join(self, &presence);
        }

        info!(
            "👋 Presence {} joined scene '{}' with {} pending entries",
            presence_id,
            self.name,
            presence.pending_count()
        );
        Ok(presence)
    }

    /// Removes a presence, discarding its pending entries without sending
    /// them. A drain in progress for it stops before its next send.
    pub fn leave(&self, presence_id: PresenceId) -> Result<(), EngineError> {
        let (_, presence) = self
            .presences
            .remove(&presence_id)
            .ok_or(EngineError::PresenceNotFound(presence_id))?;

        let discarded = presence.depart();
        StatsCounters::bump(&self.stats.presences_left);
        StatsCounters::add(&self.stats.entries_discarded, discarded as u64);

        for hook in self.hooks_snapshot() {
            hook.on_leave(self, presence_id);
        }

        info!(
            "🚪 Presence {} left scene '{}', discarded {} pending entries",
            presence_id, self.name, discarded
        );
        Ok(())
    }

    /// Moves a presence. Once it has travelled farther than the configured
    /// re-prioritization distance, its pending entries are re-scored;
    /// entries whose type now suppresses them keep their old priority.
    pub fn update_presence_position(&self, presence_id: PresenceId, position: Vec3) -> Result<(), EngineError> {
        let presence = self
            .presence(presence_id)
            .ok_or(EngineError::PresenceNotFound(presence_id))?;
        presence.set_position(position);

        let Some(threshold) = self.config.reprioritize_distance else {
            return Ok(());
        };
        if !presence.take_reprioritize(threshold) {
            return Ok(());
        }

        // Priority functions may read the presence, so score outside the lock.
        let snapshot = presence.interest().snapshot();
        let scores: HashMap<EventId, (u64, Priority)> = snapshot
            .into_iter()
            .filter_map(|(revision, event)| {
                let priority = self
                    .registry
                    .get(&event.type_name)
                    .and_then(|handlers| handlers.priority(&event, &presence))?;
                Some((event.id, (revision, priority)))
            })
            .collect();

        let changed = presence.interest().apply_priorities(&scores);
        debug!("Re-scored {} pending entries for presence {}", changed, presence_id);
        Ok(())
    }
}
