/// Core Scene implementation
use super::lifecycle::PresenceLifecycle;
use super::stats::{EngineStats, StatsCounters};
use crate::config::EngineConfig;
use crate::presence::Presence;
use crate::registry::{EventType, TypeHandlers, TypeRegistry};
use crate::types::PresenceId;
use crate::utils::read;
use compact_str::CompactString;
use dashmap::DashMap;
use std::any::Any;
use std::sync::{Arc, RwLock};

/// A shared spatial scene: its registered event types, its connected
/// presences and their interest lists.
///
/// `Scene` is used through `Arc<Scene>` (see [`create_scene`](crate::create_scene)).
/// Every method takes `&self`; publishes, drains, joins and leaves may all
/// happen concurrently from different threads.
pub struct Scene {
    pub(super) name: CompactString,
    pub(super) config: EngineConfig,
    pub(super) registry: TypeRegistry,
    /// Concurrent map of connected presences
    pub(super) presences: DashMap<PresenceId, Arc<Presence>>,
    /// Join/leave hooks in registration order
    pub(super) hooks: RwLock<Vec<Arc<dyn PresenceLifecycle>>>,
    pub(super) stats: StatsCounters,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("presences", &self.presences.len())
            .field("types", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Scene {
    /// Creates an empty scene with no registered types and no presences.
    pub fn new(name: &str, config: EngineConfig) -> Self {
        Self {
            name: CompactString::new(name),
            config,
            registry: TypeRegistry::new(),
            presences: DashMap::new(),
            hooks: RwLock::new(Vec::new()),
            stats: StatsCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Registers untyped handlers for `type_name`, replacing any previous
    /// registration.
    pub fn register(&self, type_name: &str, handlers: TypeHandlers) {
        self.registry.register(type_name, handlers);
    }

    /// Registers a typed event type built with [`EventType`].
    pub fn register_type<P>(&self, event_type: EventType<P>)
    where
        P: Any + Send + Sync,
    {
        let (name, handlers) = event_type.into_handlers();
        self.registry.register(&name, handlers);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registry.contains(type_name)
    }

    pub fn presence(&self, id: PresenceId) -> Option<Arc<Presence>> {
        self.presences.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn presence_count(&self) -> usize {
        self.presences.len()
    }

    pub fn presence_ids(&self) -> Vec<PresenceId> {
        self.presences.iter().map(|entry| *entry.key()).collect()
    }

    /// Clones the current set of presence handles so callers can iterate
    /// without holding map shards across joins and leaves.
    pub(crate) fn presence_snapshot(&self) -> Vec<Arc<Presence>> {
        self.presences.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub(crate) fn hooks_snapshot(&self) -> Vec<Arc<dyn PresenceLifecycle>> {
        read(&self.hooks).clone()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot(self.presences.len(), self.registry.len())
    }
}
