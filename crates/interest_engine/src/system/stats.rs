/// Statistics tracking for a scene
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated without locks from publish and drain paths.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub events_published: AtomicU64,
    pub entries_queued: AtomicU64,
    pub entries_coalesced: AtomicU64,
    pub entries_suppressed: AtomicU64,
    pub combine_failures: AtomicU64,
    pub unregistered_drops: AtomicU64,
    pub drains: AtomicU64,
    pub busy_drains: AtomicU64,
    pub entries_drained: AtomicU64,
    pub entries_discarded: AtomicU64,
    pub sends: AtomicU64,
    pub send_failures: AtomicU64,
    pub presences_joined: AtomicU64,
    pub presences_left: AtomicU64,
}

impl StatsCounters {
    pub fn add(counter: &AtomicU64, amount: u64) {
        if amount > 0 {
            counter.fetch_add(amount, Ordering::Relaxed);
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, presences: usize, registered_types: usize) -> EngineStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        EngineStats {
            presences,
            registered_types,
            events_published: load(&self.events_published),
            entries_queued: load(&self.entries_queued),
            entries_coalesced: load(&self.entries_coalesced),
            entries_suppressed: load(&self.entries_suppressed),
            combine_failures: load(&self.combine_failures),
            unregistered_drops: load(&self.unregistered_drops),
            drains: load(&self.drains),
            busy_drains: load(&self.busy_drains),
            entries_drained: load(&self.entries_drained),
            entries_discarded: load(&self.entries_discarded),
            sends: load(&self.sends),
            send_failures: load(&self.send_failures),
            presences_joined: load(&self.presences_joined),
            presences_left: load(&self.presences_left),
        }
    }
}

/// Point-in-time view of a scene's counters, for monitoring and logs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Presences currently in the scene
    pub presences: usize,
    /// Event types currently registered
    pub registered_types: usize,
    /// Calls to `publish` and `publish_to` that reached dispatch
    pub events_published: u64,
    /// New pending entries created
    pub entries_queued: u64,
    /// Publishes folded into an existing pending entry
    pub entries_coalesced: u64,
    /// Per-presence deliveries skipped by a priority function
    pub entries_suppressed: u64,
    pub combine_failures: u64,
    /// Publishes dropped because their type was not registered
    pub unregistered_drops: u64,
    pub drains: u64,
    /// Drain triggers that found another drain already running
    pub busy_drains: u64,
    pub entries_drained: u64,
    /// Pending entries thrown away when their presence left
    pub entries_discarded: u64,
    /// Send handler invocations
    pub sends: u64,
    pub send_failures: u64,
    pub presences_joined: u64,
    pub presences_left: u64,
}
