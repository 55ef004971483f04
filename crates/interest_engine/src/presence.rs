//! Connected presences and their interest lists.
//!
//! A [`Presence`] is created by [`Scene::join`](crate::Scene::join) and
//! shared as `Arc<Presence>` between the scene's presence map, in-flight
//! publishes and in-flight drains. [`Scene::leave`](crate::Scene::leave)
//! marks it departed and discards its list; anyone still holding the `Arc`
//! observes [`Presence::is_alive`] returning `false`.

use crate::interest::InterestList;
use crate::types::{EventId, PresenceId, Priority, Vec3};
use crate::utils::{current_timestamp, lock, read, write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};

/// One connected client session in a scene.
#[derive(Debug)]
pub struct Presence {
    id: PresenceId,
    /// Current avatar position, read by priority functions
    position: RwLock<Vec3>,
    /// Position at which pending entries were last re-scored
    reprioritized_at: Mutex<Vec3>,
    alive: AtomicBool,
    draining: AtomicBool,
    interest: Mutex<InterestList>,
    joined_at: u64,
}

impl Presence {
    pub(crate) fn new(id: PresenceId, position: Vec3) -> Self {
        Self {
            id,
            position: RwLock::new(position),
            reprioritized_at: Mutex::new(position),
            alive: AtomicBool::new(true),
            draining: AtomicBool::new(false),
            interest: Mutex::new(InterestList::new()),
            joined_at: current_timestamp(),
        }
    }

    pub fn id(&self) -> PresenceId {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        *read(&self.position)
    }

    /// Unix timestamp (seconds) of when the presence joined.
    pub fn joined_at(&self) -> u64 {
        self.joined_at
    }

    /// `false` once the presence has left the scene.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Number of entries waiting to be drained.
    pub fn pending_count(&self) -> usize {
        self.interest().len()
    }

    pub fn is_pending(&self, id: &EventId) -> bool {
        self.interest().contains(id)
    }

    /// Snapshot of pending entries as `(id, type name, priority)`, most
    /// urgent first.
    pub fn pending(&self) -> Vec<(EventId, String, Priority)> {
        let list = self.interest();
        let mut pending: Vec<_> = list
            .iter()
            .map(|entry| (entry.id(), entry.type_name().to_string(), entry.priority, entry.sequence()))
            .collect();
        pending.sort_by(|a, b| a.2.cmp(&b.2).then(a.3.cmp(&b.3)));
        pending
            .into_iter()
            .map(|(id, type_name, priority, _)| (id, type_name, priority))
            .collect()
    }

    pub(crate) fn interest(&self) -> MutexGuard<'_, InterestList> {
        lock(&self.interest)
    }

    pub(crate) fn set_position(&self, position: Vec3) {
        *write(&self.position) = position;
    }

    /// Returns true and resets the anchor when the presence has moved more
    /// than `threshold` since its entries were last re-scored.
    pub(crate) fn take_reprioritize(&self, threshold: f64) -> bool {
        let position = self.position();
        let mut anchor = lock(&self.reprioritized_at);
        if anchor.distance_squared(position) > threshold * threshold {
            *anchor = position;
            true
        } else {
            false
        }
    }

    /// Claims the right to drain this presence. `None` while another drain
    /// holds it.
    pub(crate) fn begin_drain(&self) -> Option<DrainGuard<'_>> {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainGuard {
                flag: &self.draining,
            })
    }

    /// Marks the presence departed and discards its pending entries.
    ///
    /// The flag is flipped under the list lock so no publish can slip an
    /// entry in after the list was cleared.
    pub(crate) fn depart(&self) -> usize {
        let mut list = self.interest();
        self.alive.store(false, Ordering::Release);
        list.clear()
    }
}

/// Releases the per-presence drain claim on drop.
pub(crate) struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
