//! # Event Type Registry
//!
//! Feature modules register, per event type name, the functions the engine
//! calls for events of that type:
//!
//! - **priority** - relevance of an event to one presence, or suppression
//! - **combine** - optional merge of a new event into a pending one
//! - **size hint** - optional byte estimate used by byte-budgeted drains
//! - **send** - turns a drained batch into the outbound protocol effect
//!
//! Handlers are stored type-erased in [`TypeHandlers`]. Most modules build
//! them through the typed [`EventType`] builder, which downcasts payloads
//! before calling feature code so callbacks work with concrete types.
//!
//! The registry belongs to a [`Scene`](crate::Scene); two scenes in one
//! process never share handlers.

use crate::error::{EngineError, SendError};
use crate::events::{Event, Payload};
use crate::interest::PendingEntry;
use crate::presence::Presence;
use crate::priority::default_priority;
use crate::types::{EventId, Priority, Vec3};
use compact_str::CompactString;
use dashmap::DashMap;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

pub type PriorityFn = dyn Fn(&Event, &Presence) -> Option<Priority> + Send + Sync;
pub type CombineFn = dyn Fn(&Event, &Event) -> Result<Payload, EngineError> + Send + Sync;
pub type SizeHintFn = dyn Fn(&Event) -> usize + Send + Sync;
pub type SendFn = dyn Fn(&[PendingEntry], &Presence) -> Result<(), SendError> + Send + Sync;

/// The handlers registered for one event type name.
#[derive(Clone)]
pub struct TypeHandlers {
    priority: Arc<PriorityFn>,
    combine: Option<Arc<CombineFn>>,
    size_hint: Option<Arc<SizeHintFn>>,
    send: Arc<SendFn>,
}

impl std::fmt::Debug for TypeHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandlers")
            .field("combine", &self.combine.is_some())
            .field("size_hint", &self.size_hint.is_some())
            .finish()
    }
}

impl TypeHandlers {
    /// Untyped handlers working directly on [`Event`]s.
    pub fn new<P, S>(priority: P, send: S) -> Self
    where
        P: Fn(&Event, &Presence) -> Option<Priority> + Send + Sync + 'static,
        S: Fn(&[PendingEntry], &Presence) -> Result<(), SendError> + Send + Sync + 'static,
    {
        Self {
            priority: Arc::new(priority),
            combine: None,
            size_hint: None,
            send: Arc::new(send),
        }
    }

    pub fn with_combine<C>(mut self, combine: C) -> Self
    where
        C: Fn(&Event, &Event) -> Result<Payload, EngineError> + Send + Sync + 'static,
    {
        self.combine = Some(Arc::new(combine));
        self
    }

    pub fn with_size_hint<H>(mut self, size_hint: H) -> Self
    where
        H: Fn(&Event) -> usize + Send + Sync + 'static,
    {
        self.size_hint = Some(Arc::new(size_hint));
        self
    }

    pub fn has_combine(&self) -> bool {
        self.combine.is_some()
    }

    pub fn priority(&self, event: &Event, presence: &Presence) -> Option<Priority> {
        (self.priority)(event, presence)
    }

    /// Folds `new` into the pending `existing` event.
    ///
    /// Without a combine function the new event replaces the old one. With
    /// one, the result keeps the new event's identity and position and
    /// carries the merged payload.
    pub fn combine(&self, existing: &Event, new: Event) -> Result<Event, EngineError> {
        match &self.combine {
            None => Ok(new),
            Some(combine) => {
                let payload = combine(existing, &new)?;
                Ok(Event { payload, ..new })
            }
        }
    }

    pub fn size_hint(&self, event: &Event) -> Option<usize> {
        self.size_hint.as_ref().map(|hint| hint(event))
    }

    pub fn send(&self, batch: &[PendingEntry], presence: &Presence) -> Result<(), SendError> {
        (self.send)(batch, presence)
    }
}

/// One drained entry as seen by a typed send handler.
#[derive(Debug)]
pub struct Delivery<'a, P> {
    pub id: EventId,
    pub priority: Priority,
    pub position: Vec3,
    pub extent: Vec3,
    pub payload: &'a P,
}

/// Typed builder for [`TypeHandlers`].
///
/// Priority defaults to [`default_priority`] when not set.
///
/// # Examples
///
/// ```rust
/// use interest_engine::{EventType, Priority, create_scene, EngineConfig};
///
/// #[derive(Debug)]
/// struct Emote { name: &'static str }
///
/// let scene = create_scene("docs", EngineConfig::default());
/// scene.register_type(
///     EventType::<Emote>::new("avatar.emote", |batch, presence| {
///         for delivery in batch {
///             println!("{} -> {}", delivery.payload.name, presence.id());
///         }
///         Ok(())
///     })
///     .priority(|event, _emote, presence| {
///         Some(Priority::new(event.position.distance_squared(presence.position())))
///     }),
/// );
/// assert!(scene.registry().contains("avatar.emote"));
/// ```
pub struct EventType<P> {
    name: CompactString,
    priority: Option<Arc<PriorityFn>>,
    combine: Option<Arc<CombineFn>>,
    size_hint: Option<Arc<SizeHintFn>>,
    send: Arc<SendFn>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> EventType<P>
where
    P: Any + Send + Sync,
{
    pub fn new<S>(name: &str, send: S) -> Self
    where
        S: Fn(&[Delivery<'_, P>], &Presence) -> Result<(), SendError> + Send + Sync + 'static,
    {
        let type_name = CompactString::new(name);
        let send = move |batch: &[PendingEntry], presence: &Presence| {
            let mut deliveries = Vec::with_capacity(batch.len());
            for entry in batch {
                let payload = entry.event.payload_as::<P>().ok_or_else(|| SendError::PayloadMismatch {
                    type_name: type_name.to_string(),
                    expected: std::any::type_name::<P>(),
                })?;
                deliveries.push(Delivery {
                    id: entry.id(),
                    priority: entry.priority,
                    position: entry.event.position,
                    extent: entry.event.extent,
                    payload,
                });
            }
            send(&deliveries, presence)
        };

        Self {
            name: CompactString::new(name),
            priority: None,
            combine: None,
            size_hint: None,
            send: Arc::new(send),
            _payload: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the priority function. A payload of the wrong type is suppressed.
    pub fn priority<F>(mut self, priority: F) -> Self
    where
        F: Fn(&Event, &P, &Presence) -> Option<Priority> + Send + Sync + 'static,
    {
        let type_name = self.name.clone();
        self.priority = Some(Arc::new(move |event: &Event, presence: &Presence| {
            match event.payload_as::<P>() {
                Some(payload) => priority(event, payload, presence),
                None => {
                    warn!(
                        "🟡 '{}' event {} carries a {} payload, expected {}; suppressing",
                        type_name,
                        event.id,
                        event.payload.rust_type(),
                        std::any::type_name::<P>()
                    );
                    None
                }
            }
        }));
        self
    }

    /// Sets the combine function, called with the pending payload first.
    pub fn combine<F>(mut self, combine: F) -> Self
    where
        F: Fn(&P, &P) -> P + Send + Sync + 'static,
    {
        let type_name = self.name.clone();
        self.combine = Some(Arc::new(move |existing: &Event, new: &Event| {
            match (existing.payload_as::<P>(), new.payload_as::<P>()) {
                (Some(existing), Some(new)) => Ok(Payload::new(combine(existing, new))),
                _ => Err(EngineError::PayloadMismatch {
                    type_name: type_name.to_string(),
                    expected: std::any::type_name::<P>(),
                }),
            }
        }));
        self
    }

    pub fn size_hint<F>(mut self, size_hint: F) -> Self
    where
        F: Fn(&P) -> usize + Send + Sync + 'static,
    {
        self.size_hint = Some(Arc::new(move |event: &Event| {
            event.payload_as::<P>().map(|payload| size_hint(payload)).unwrap_or(0)
        }));
        self
    }

    pub fn into_handlers(self) -> (CompactString, TypeHandlers) {
        let priority = self
            .priority
            .unwrap_or_else(|| Arc::new(|event: &Event, presence: &Presence| default_priority(event, presence)));

        let handlers = TypeHandlers {
            priority,
            combine: self.combine,
            size_hint: self.size_hint,
            send: self.send,
        };
        (self.name, handlers)
    }
}

/// Concurrent map from event type name to its handlers.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    handlers: DashMap<CompactString, Arc<TypeHandlers>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers handlers for `type_name`, replacing and returning any
    /// previous registration.
    pub fn register(&self, type_name: &str, handlers: TypeHandlers) -> Option<Arc<TypeHandlers>> {
        let merge = if handlers.has_combine() { "combine" } else { "replace" };
        let previous = self
            .handlers
            .insert(CompactString::new(type_name), Arc::new(handlers));

        if previous.is_some() {
            info!("🔁 Replaced handlers for event type '{}' (coalesce: {})", type_name, merge);
        } else {
            info!("📝 Registered event type '{}' (coalesce: {})", type_name, merge);
        }
        previous
    }

    pub fn unregister(&self, type_name: &str) -> Option<Arc<TypeHandlers>> {
        self.handlers.remove(type_name).map(|(_, handlers)| handlers)
    }

    /// Looks up handlers; the returned `Arc` outlives any later replacement.
    pub fn get(&self, type_name: &str) -> Option<Arc<TypeHandlers>> {
        self.handlers.get(type_name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.handlers.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|entry| entry.key().to_string()).collect();
        names.sort();
        names
    }
}
