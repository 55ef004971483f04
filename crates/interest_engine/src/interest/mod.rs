//! Per-presence interest lists.
//!
//! Every presence owns one [`InterestList`]: the pending events it has not
//! yet been sent, keyed by [`EventId`](crate::EventId) for coalescing and
//! ordered by priority for draining.

mod list;

pub use list::{InsertOutcome, InterestList, PendingEntry};
