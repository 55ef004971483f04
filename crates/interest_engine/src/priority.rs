//! Distance-based priority functions.
//!
//! Priorities are squared distances between the event and the presence, so
//! cutoffs are expressed in squared scene units as well (a 20 m cutoff is
//! `400.0`).

use crate::events::Event;
use crate::presence::Presence;
use crate::types::Priority;

/// Squared distance from the event to the presence. Never suppresses.
pub fn default_priority(event: &Event, presence: &Presence) -> Option<Priority> {
    Some(Priority::new(event.position.distance_squared(presence.position())))
}

/// [`default_priority`] shifted by `bias`; positive values drain later.
pub fn biased(event: &Event, presence: &Presence, bias: f64) -> Option<Priority> {
    default_priority(event, presence).map(|priority| priority.biased(bias))
}

/// [`default_priority`], suppressed when the squared distance exceeds
/// `cutoff_squared`.
pub fn within_cutoff(event: &Event, presence: &Presence, cutoff_squared: f64) -> Option<Priority> {
    default_priority(event, presence).filter(|priority| priority.value() <= cutoff_squared)
}
