/// Coalescing priority structure owned by one presence
use crate::error::EngineError;
use crate::events::Event;
use crate::types::{EventId, Priority};
use std::cmp::Ordering;
use std::collections::HashMap;

/// An event waiting in a presence's interest list.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// The current (possibly combined) event for this ID
    pub event: Event,
    /// Priority computed for the owning presence at the last insert or update
    pub priority: Priority,
    /// Insertion order of the first event under this ID, breaks priority ties
    sequence: u64,
    /// Bumped every time the entry's event is inserted or replaced
    revision: u64,
}

impl PendingEntry {
    pub fn id(&self) -> EventId {
        self.event.id
    }

    pub fn type_name(&self) -> &str {
        &self.event.type_name
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn precedes(&self, other: &PendingEntry) -> bool {
        match self.priority.cmp(&other.priority) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.sequence < other.sequence,
        }
    }
}

/// Result of inserting an event into an interest list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No entry existed for the ID; a new one was created
    Inserted,
    /// An entry existed and was replaced or merged in place
    Coalesced,
}

/// Keyed map plus indexed binary min-heap over the same pending entries.
///
/// `slots` maps every pending [`EventId`] to its index in `heap`; every
/// heap mutation goes through [`InterestList::swap`] or
/// [`InterestList::rebuild_slots`] so the two never disagree. The root of
/// the heap is always the most urgent entry, ties broken by age.
#[derive(Debug, Default)]
pub struct InterestList {
    slots: HashMap<EventId, usize>,
    heap: Vec<PendingEntry>,
    next_sequence: u64,
    next_revision: u64,
}

impl InterestList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn get(&self, id: &EventId) -> Option<&PendingEntry> {
        self.slots.get(id).map(|&slot| &self.heap[slot])
    }

    /// The most urgent entry without removing it.
    pub fn peek(&self) -> Option<&PendingEntry> {
        self.heap.first()
    }

    /// Iterates pending entries in heap order (not priority order).
    pub fn iter(&self) -> impl Iterator<Item = &PendingEntry> {
        self.heap.iter()
    }

    /// Inserts `event` at `priority`, or coalesces it into the entry already
    /// pending under the same ID.
    ///
    /// On coalesce, `merge` receives the pending event and the new one and
    /// returns what should stay pending; the entry takes the new priority
    /// and keeps its original sequence. If `merge` fails the existing entry
    /// is left exactly as it was.
    pub fn upsert<F>(
        &mut self,
        event: Event,
        priority: Priority,
        merge: F,
    ) -> Result<InsertOutcome, EngineError>
    where
        F: FnOnce(&Event, Event) -> Result<Event, EngineError>,
    {
        if let Some(&slot) = self.slots.get(&event.id) {
            let merged = merge(&self.heap[slot].event, event)?;
            let revision = self.bump_revision();
            let entry = &mut self.heap[slot];
            entry.event = merged;
            entry.priority = priority;
            entry.revision = revision;
            self.restore(slot);
            return Ok(InsertOutcome::Coalesced);
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let revision = self.bump_revision();

        let slot = self.heap.len();
        self.slots.insert(event.id, slot);
        self.heap.push(PendingEntry {
            event,
            priority,
            sequence,
            revision,
        });
        self.sift_up(slot);
        Ok(InsertOutcome::Inserted)
    }

    /// Removes and returns the most urgent entry.
    pub fn pop(&mut self) -> Option<PendingEntry> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Removes the entry pending under `id`, wherever it sits in the heap.
    pub fn remove(&mut self, id: &EventId) -> Option<PendingEntry> {
        let slot = *self.slots.get(id)?;
        Some(self.remove_at(slot))
    }

    /// Discards every pending entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let discarded = self.heap.len();
        self.heap.clear();
        self.slots.clear();
        discarded
    }

    /// Recomputes priorities for all pending entries.
    ///
    /// `rescore` returning `None` leaves that entry's priority unchanged.
    /// Returns the number of entries whose priority changed.
    pub fn reprioritize<F>(&mut self, mut rescore: F) -> usize
    where
        F: FnMut(&PendingEntry) -> Option<Priority>,
    {
        let mut changed = 0;
        for entry in &mut self.heap {
            if let Some(priority) = rescore(entry) {
                if priority != entry.priority {
                    entry.priority = priority;
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            for slot in (0..self.heap.len() / 2).rev() {
                self.sift_down(slot);
            }
            self.rebuild_slots();
        }
        changed
    }

    /// Copies every pending event together with its current revision.
    ///
    /// Pair with [`InterestList::apply_priorities`] to score entries without
    /// holding whatever lock guards the list.
    pub fn snapshot(&self) -> Vec<(u64, Event)> {
        self.heap
            .iter()
            .map(|entry| (entry.revision, entry.event.clone()))
            .collect()
    }

    /// Applies priorities computed from a [`snapshot`](InterestList::snapshot).
    ///
    /// Scores are keyed by event ID and tagged with the revision they were
    /// computed against. Entries that were replaced, combined, or newly
    /// inserted since the snapshot keep their current priority. Returns the
    /// number of entries whose priority changed.
    pub fn apply_priorities(&mut self, scores: &HashMap<EventId, (u64, Priority)>) -> usize {
        self.reprioritize(|entry| {
            scores
                .get(&entry.id())
                .filter(|(revision, _)| *revision == entry.revision)
                .map(|&(_, priority)| priority)
        })
    }

    fn bump_revision(&mut self) -> u64 {
        let revision = self.next_revision;
        self.next_revision += 1;
        revision
    }

    fn remove_at(&mut self, slot: usize) -> PendingEntry {
        let removed = self.heap.swap_remove(slot);
        self.slots.remove(&removed.event.id);

        if slot < self.heap.len() {
            self.slots.insert(self.heap[slot].event.id, slot);
            self.restore(slot);
        }
        removed
    }

    /// Moves the entry at `slot` up or down until the heap property holds.
    fn restore(&mut self, slot: usize) {
        let slot = self.sift_up(slot);
        self.sift_down(slot);
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.heap[slot].precedes(&self.heap[parent]) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut best = slot;

            if left < len && self.heap[left].precedes(&self.heap[best]) {
                best = left;
            }
            if right < len && self.heap[right].precedes(&self.heap[best]) {
                best = right;
            }
            if best == slot {
                break;
            }
            self.swap(slot, best);
            slot = best;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.slots.insert(self.heap[a].event.id, a);
        self.slots.insert(self.heap[b].event.id, b);
    }

    fn rebuild_slots(&mut self) {
        self.slots.clear();
        for (slot, entry) in self.heap.iter().enumerate() {
            self.slots.insert(entry.event.id, slot);
        }
    }

    /// Panics if the map and the heap disagree or the heap property is broken.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.slots.len(), self.heap.len(), "map and heap sizes differ");
        for (slot, entry) in self.heap.iter().enumerate() {
            assert_eq!(self.slots.get(&entry.event.id), Some(&slot), "stale slot for {}", entry.event.id);
            if slot > 0 {
                let parent = (slot - 1) / 2;
                assert!(
                    !entry.precedes(&self.heap[parent]),
                    "heap property violated at slot {slot}"
                );
            }
        }
    }
}
