//! # Events and Payloads
//!
//! An [`Event`] is one positioned, identified unit of pending state change.
//! Feature modules build events and hand them to
//! [`Scene::publish`](crate::Scene::publish) or
//! [`Scene::publish_to`](crate::Scene::publish_to); the engine never looks
//! inside the [`Payload`], which is interpreted only by the handlers
//! registered for the event's type name.
//!
//! ## Design Principles
//!
//! - **Cheap to fan out**: cloning an event clones an `Arc`, so `publish`
//!   can hand a copy to every presence without copying payload data
//! - **Checked downcasts**: payloads remember their Rust type and are only
//!   ever read back through [`Payload::downcast_ref`]

use crate::types::{EventId, Vec3};
use compact_str::CompactString;
use std::any::Any;
use std::sync::Arc;

/// Type-erased event payload.
///
/// Typed handler registration ([`EventType`](crate::EventType)) downcasts the
/// payload back to its concrete type before any feature code sees it.
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    rust_type: &'static str,
}

impl Payload {
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            value: Arc::new(value),
            rust_type: std::any::type_name::<T>(),
        }
    }

    /// Returns the payload as `T` if that is the type it was created with.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Name of the concrete Rust type, for diagnostics.
    pub fn rust_type(&self) -> &'static str {
        self.rust_type
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("rust_type", &self.rust_type)
            .finish()
    }
}

/// A tagged, positioned, identified unit of pending state change.
///
/// # Examples
///
/// ```rust
/// use interest_engine::{Event, EventId, Vec3};
///
/// #[derive(Debug)]
/// struct ChatLine { text: String }
///
/// let event = Event::new(
///     EventId::random(),
///     "chat.message",
///     Vec3::new(128.0, 128.0, 25.0),
///     ChatLine { text: "hello".into() },
/// );
/// assert_eq!(event.payload_as::<ChatLine>().map(|c| c.text.as_str()), Some("hello"));
/// ```
#[derive(Debug, Clone)]
pub struct Event {
    /// Coalescing key within a presence's interest list
    pub id: EventId,
    /// Selects the registered priority/combine/send handlers
    pub type_name: CompactString,
    /// Scene position used for relevance and priority
    pub position: Vec3,
    /// Bounding size of the subject, zero for point events
    pub extent: Vec3,
    /// Opaque data read only by the type's handlers
    pub payload: Payload,
}

impl Event {
    pub fn new<T>(id: EventId, type_name: &str, position: Vec3, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            id,
            type_name: CompactString::new(type_name),
            position,
            extent: Vec3::zero(),
            payload: Payload::new(payload),
        }
    }

    pub fn with_extent(mut self, extent: Vec3) -> Self {
        self.extent = extent;
        self
    }

    /// Shorthand for `self.payload.downcast_ref::<T>()`.
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}
