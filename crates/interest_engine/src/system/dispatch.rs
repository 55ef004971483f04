/// Publish paths: fan an event out into presences' interest lists
use super::core::Scene;
use super::stats::StatsCounters;
use crate::config::UnknownTypePolicy;
use crate::error::EngineError;
use crate::events::Event;
use crate::interest::InsertOutcome;
use crate::presence::Presence;
use crate::registry::TypeHandlers;
use crate::types::PresenceId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// What one publish did across the presences it reached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    /// Presences that got a new pending entry
    pub queued: usize,
    /// Presences whose pending entry for this ID was replaced or merged
    pub coalesced: usize,
    /// Presences for which the priority function suppressed the event
    pub suppressed: usize,
}

impl PublishReport {
    /// Presences that now hold this event in some form.
    pub fn reached(&self) -> usize {
        self.queued + self.coalesced
    }
}

impl Scene {
    /// Offers `event` to every presence currently in the scene.
    ///
    /// The presence set is snapshotted first; presences joining during the
    /// call may or may not see the event, presences leaving during it never
    /// keep it.
    pub fn publish(&self, event: Event) -> Result<PublishReport, EngineError> {
        let handlers = self.handlers_for(&event)?;
        StatsCounters::bump(&self.stats.events_published);

        let mut report = PublishReport::default();
        for presence in self.presence_snapshot() {
            self.insert(&presence, event.clone(), &handlers, &mut report);
        }

        trace!(
            "Published {} '{}' to {} presences: queued={} coalesced={} suppressed={}",
            event.id,
            event.type_name,
            report.reached(),
            report.queued,
            report.coalesced,
            report.suppressed
        );
        Ok(report)
    }

    /// Offers `event` to exactly one presence.
    pub fn publish_to(&self, presence_id: PresenceId, event: Event) -> Result<PublishReport, EngineError> {
        let handlers = self.handlers_for(&event)?;
        let presence = self
            .presence(presence_id)
            .ok_or(EngineError::PresenceNotFound(presence_id))?;
        StatsCounters::bump(&self.stats.events_published);

        let mut report = PublishReport::default();
        self.insert(&presence, event, &handlers, &mut report);
        Ok(report)
    }

    fn handlers_for(&self, event: &Event) -> Result<Arc<TypeHandlers>, EngineError> {
        if let Some(handlers) = self.registry.get(&event.type_name) {
            return Ok(handlers);
        }

        StatsCounters::bump(&self.stats.unregistered_drops);
        match self.config.unknown_type_policy {
            UnknownTypePolicy::Panic => {
                panic!("event type '{}' published without a registration", event.type_name)
            }
            UnknownTypePolicy::LogAndDrop => {
                error!(
                    "❌ Dropping event {}: type '{}' is not registered in scene '{}'",
                    event.id, event.type_name, self.name
                );
                Err(EngineError::UnregisteredType(event.type_name.to_string()))
            }
        }
    }

    /// Scores `event` for one presence and stores or coalesces it.
    pub(super) fn insert(
        &self,
        presence: &Presence,
        event: Event,
        handlers: &TypeHandlers,
        report: &mut PublishReport,
    ) {
        let Some(priority) = handlers.priority(&event, presence) else {
            report.suppressed += 1;
            StatsCounters::bump(&self.stats.entries_suppressed);
            return;
        };

        let event_id = event.id;
        let mut list = presence.interest();
        // Checked under the list lock so a concurrent leave cannot be undone.
        if !presence.is_alive() {
            return;
        }

        match list.upsert(event, priority, |existing, new| handlers.combine(existing, new)) {
            Ok(InsertOutcome::Inserted) => {
                report.queued += 1;
                StatsCounters::bump(&self.stats.entries_queued);
            }
            Ok(InsertOutcome::Coalesced) => {
                report.coalesced += 1;
                StatsCounters::bump(&self.stats.entries_coalesced);
            }
            Err(err) => {
                StatsCounters::bump(&self.stats.combine_failures);
                warn!(
                    "⚠️ Combine failed for {} at presence {}, keeping pending entry: {}",
                    event_id,
                    presence.id(),
                    err
                );
            }
        }
    }
}
