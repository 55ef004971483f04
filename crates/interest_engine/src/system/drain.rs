/// Drain primitive: extract, group by type, send
use super::core::Scene;
use super::stats::StatsCounters;
use crate::error::EngineError;
use crate::interest::PendingEntry;
use crate::presence::Presence;
use crate::types::PresenceId;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// How much one drain may take out of an interest list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainBudget {
    /// Empty the list
    #[default]
    Unlimited,
    /// At most this many entries
    Entries(usize),
    /// Entries whose size hints add up to at most this many bytes. The most
    /// urgent entry is always taken even if it alone exceeds the limit.
    Bytes(usize),
}

impl DrainBudget {
    pub fn is_zero(&self) -> bool {
        matches!(self, DrainBudget::Entries(0) | DrainBudget::Bytes(0))
    }
}

/// Outcome of draining one presence (or, from [`Scene::drain_all`], the sum
/// over all presences).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Entries taken out of the interest list
    pub drained: usize,
    /// Send calls made, one per event type present in the drained set
    pub batches: usize,
    /// Send calls that returned an error or panicked
    pub failed_batches: usize,
    /// Byte cost of the drained entries, accounted only under a byte budget
    pub bytes: usize,
    /// Another drain held the presence; nothing was done
    pub busy: bool,
    /// The presence left part-way and the remaining batches were dropped
    pub interrupted: bool,
}

impl DrainReport {
    fn absorb(&mut self, other: &DrainReport) {
        self.drained += other.drained;
        self.batches += other.batches;
        self.failed_batches += other.failed_batches;
        self.bytes += other.bytes;
        self.busy |= other.busy;
        self.interrupted |= other.interrupted;
    }
}

/// Drained entries of one event type, in priority order.
struct TypeBatch {
    type_name: CompactString,
    entries: Vec<PendingEntry>,
}

impl Scene {
    /// Drains one presence's interest list under `budget`.
    ///
    /// Draining an empty list does nothing and succeeds.
    pub fn drain(&self, presence_id: PresenceId, budget: DrainBudget) -> Result<DrainReport, EngineError> {
        let presence = self
            .presence(presence_id)
            .ok_or(EngineError::PresenceNotFound(presence_id))?;
        Ok(self.drain_presence(&presence, budget))
    }

    /// Drains every presence in the scene, each under its own `budget`.
    pub fn drain_all(&self, budget: DrainBudget) -> DrainReport {
        let mut total = DrainReport::default();
        for presence in self.presence_snapshot() {
            total.absorb(&self.drain_presence(&presence, budget));
        }
        total
    }

    pub(crate) fn drain_presence(&self, presence: &Presence, budget: DrainBudget) -> DrainReport {
        let mut report = DrainReport::default();
        if !presence.is_alive() || budget.is_zero() {
            return report;
        }

        let Some(_guard) = presence.begin_drain() else {
            report.busy = true;
            StatsCounters::bump(&self.stats.busy_drains);
            debug!("Drain for presence {} already in progress, skipping", presence.id());
            return report;
        };
        StatsCounters::bump(&self.stats.drains);

        let (entries, bytes) = self.extract(presence, budget);
        if entries.is_empty() {
            return report;
        }
        report.drained = entries.len();
        report.bytes = bytes;
        StatsCounters::add(&self.stats.entries_drained, entries.len() as u64);

        for batch in group_by_type(entries) {
            if !presence.is_alive() {
                report.interrupted = true;
                debug!(
                    "Presence {} left mid-drain, dropping remaining '{}' batch",
                    presence.id(),
                    batch.type_name
                );
                break;
            }
            self.send_batch(presence, batch, &mut report);
        }

        debug!(
            "Drained {} entries in {} batches for presence {}",
            report.drained,
            report.batches,
            presence.id()
        );
        report
    }

    /// Pops entries in priority order until the budget or the list runs out.
    fn extract(&self, presence: &Presence, budget: DrainBudget) -> (Vec<PendingEntry>, usize) {
        let mut list = presence.interest();
        let mut taken = Vec::new();
        let mut bytes = 0;

        loop {
            if let DrainBudget::Entries(limit) = budget {
                if taken.len() >= limit {
                    break;
                }
            }
            let Some(next) = list.peek() else {
                break;
            };
            if let DrainBudget::Bytes(limit) = budget {
                let cost = self.entry_size(next);
                if !taken.is_empty() && bytes + cost > limit {
                    break;
                }
                bytes += cost;
            }
            if let Some(entry) = list.pop() {
                taken.push(entry);
            }
        }
        (taken, bytes)
    }

    fn entry_size(&self, entry: &PendingEntry) -> usize {
        self.registry
            .get(entry.type_name())
            .and_then(|handlers| handlers.size_hint(&entry.event))
            .unwrap_or(self.config.default_entry_size)
    }

    fn send_batch(&self, presence: &Presence, batch: TypeBatch, report: &mut DrainReport) {
        let Some(handlers) = self.registry.get(&batch.type_name) else {
            report.failed_batches += 1;
            StatsCounters::bump(&self.stats.send_failures);
            warn!(
                "⚠️ Type '{}' was unregistered before its {} entries drained for presence {}",
                batch.type_name,
                batch.entries.len(),
                presence.id()
            );
            return;
        };

        report.batches += 1;
        StatsCounters::bump(&self.stats.sends);

        match catch_unwind(AssertUnwindSafe(|| handlers.send(&batch.entries, presence))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                report.failed_batches += 1;
                StatsCounters::bump(&self.stats.send_failures);
                warn!(
                    "⚠️ Send of {} '{}' entries to presence {} failed: {}",
                    batch.entries.len(),
                    batch.type_name,
                    presence.id(),
                    err
                );
            }
            Err(panic) => {
                report.failed_batches += 1;
                StatsCounters::bump(&self.stats.send_failures);
                error!(
                    "💥 Send handler for '{}' panicked for presence {}: {}",
                    batch.type_name,
                    presence.id(),
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

/// Splits a priority-ordered batch by type name. Groups keep the order of
/// their first entry, so the most urgent type is sent first.
fn group_by_type(entries: Vec<PendingEntry>) -> SmallVec<[TypeBatch; 4]> {
    let mut groups: SmallVec<[TypeBatch; 4]> = SmallVec::new();
    for entry in entries {
        match groups.iter_mut().find(|group| group.type_name.as_str() == entry.type_name()) {
            Some(group) => group.entries.push(entry),
            None => groups.push(TypeBatch {
                type_name: entry.event.type_name.clone(),
                entries: vec![entry],
            }),
        }
    }
    groups
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
