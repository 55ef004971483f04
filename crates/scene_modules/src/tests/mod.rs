//! Scenario tests for the feature modules
//!
//! Each scenario installs the real modules on a scene over a
//! [`MockTransport`] and inspects the protocol messages every presence
//! would have received:
//! - chat ranges, typing coalescing and instant message targeting
//! - ambient preload range cutoff
//! - object flag merging, kills and stale updates
//! - join snapshots from objects, terrain, appearance and parcel overlay

use crate::messages::OutboundMessage;
use crate::transport::{ClientTransport, TransportError};
use crate::{install_default_modules, SceneModules};
use interest_engine::{EngineConfig, PresenceId, Scene, UnknownTypePolicy, Vec3};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};





/// Mock transport that captures every delivered message per presence
#[derive(Debug, Default)]
pub struct MockTransport {
    pub delivered: Arc<Mutex<HashMap<PresenceId, Vec<OutboundMessage>>>>,
}

impl MockTransport {
    pub fn messages(&self, presence: PresenceId) -> Vec<OutboundMessage> {
        self.delivered
            .lock()
            .unwrap()
            .get(&presence)
            .cloned()
            .unwrap_or_default()
    }

    pub fn kinds(&self, presence: PresenceId) -> Vec<&'static str> {
        self.messages(presence).iter().map(|m| m.kind()).collect()
    }

    pub fn clear(&self) {
        self.delivered.lock().unwrap().clear();
    }
}

impl ClientTransport for MockTransport {
    fn deliver(&self, presence: PresenceId, message: OutboundMessage) -> Result<(), TransportError> {
        self.delivered
            .lock()
            .unwrap()
            .entry(presence)
            .or_default()
            .push(message);
        Ok(())
    }
}

pub struct Harness {
    pub scene: Arc<Scene>,
    pub transport: Arc<MockTransport>,
    pub modules: SceneModules,
}

impl Harness {
    pub fn new() -> Self {
        let scene = interest_engine::create_scene(
            "scenario",
            EngineConfig {
                unknown_type_policy: UnknownTypePolicy::LogAndDrop,
                ..EngineConfig::default()
            },
        );
        let transport = Arc::new(MockTransport::default());
        let modules = install_default_modules(&scene, transport.clone());
        Self {
            scene,
            transport,
            modules,
        }
    }

    /// Joins a presence and throws away its parcel overlay so scenarios only
    /// see their own traffic.
    pub fn join(&self, position: Vec3) -> PresenceId {
        let presence = PresenceId::new();
        self.scene.join(presence, position).unwrap();
        self.scene
            .drain(presence, interest_engine::DrainBudget::Unlimited)
            .unwrap();
        self.transport.delivered.lock().unwrap().remove(&presence);
        presence
    }

    pub fn drain(&self, presence: PresenceId) {
        self.scene
            .drain(presence, interest_engine::DrainBudget::Unlimited)
            .unwrap();
    }
}
